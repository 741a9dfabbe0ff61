use std::sync::Arc;

use serde_json::Value;

use crate::cache::ClientCache;
use crate::error::ApiError;

/// VidCap endpoints exposed as tools.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Info,
    Media,
    Caption,
    Summary,
    Screenshot,
    ScreenshotMultiple,
    Comments,
    Search,
}

impl Endpoint {
    pub const ALL: [Endpoint; 8] = [
        Self::Info,
        Self::Media,
        Self::Caption,
        Self::Summary,
        Self::Screenshot,
        Self::ScreenshotMultiple,
        Self::Comments,
        Self::Search,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Self::Info => "/youtube/info",
            Self::Media => "/youtube/media",
            Self::Caption => "/youtube/caption",
            Self::Summary => "/youtube/summary",
            Self::Screenshot => "/youtube/screenshot",
            Self::ScreenshotMultiple => "/youtube/screenshot-multiple",
            Self::Comments => "/youtube/comments",
            Self::Search => "/youtube/search",
        }
    }
}

/// Thin VidCap client: resolves the caller's cached client and forwards
/// the call.
#[derive(Clone)]
pub struct VidcapApi {
    cache: Arc<ClientCache>,
}

impl VidcapApi {
    pub fn new(cache: Arc<ClientCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<ClientCache> {
        &self.cache
    }

    /// Call `endpoint` with the credential of the current request.
    ///
    /// VidCap answers HTTP 200 with `"status": 0` on logical failures; those
    /// come back as [`ApiError::Rejected`].
    pub async fn call(
        &self,
        endpoint: Endpoint,
        query: &[(String, String)],
    ) -> Result<Value, ApiError> {
        let client = self.cache.current()?;
        let body = client.get_json(endpoint.path(), query).await?;
        check_status(body)
    }
}

fn check_status(body: Value) -> Result<Value, ApiError> {
    match body.get("status").and_then(Value::as_i64) {
        Some(1) | None => Ok(body),
        Some(_) => {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("API request indicated failure.")
                .to_string();
            Err(ApiError::Rejected(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use serde_json::json;
    use vidcap_core::{Credential, CredentialScope};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_for(server: &MockServer) -> VidcapApi {
        let config = ClientConfig {
            base_url: server.uri(),
            ..ClientConfig::default()
        };
        VidcapApi::new(Arc::new(ClientCache::new(config)))
    }

    #[test]
    fn endpoint_paths_are_unique() {
        let mut paths: Vec<_> = Endpoint::ALL.iter().map(|e| e.path()).collect();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), Endpoint::ALL.len());
        assert_eq!(Endpoint::ScreenshotMultiple.path(), "/youtube/screenshot-multiple");
    }

    #[test]
    fn status_zero_is_rejected_with_message() {
        let err = check_status(json!({"status": 0, "message": "Video not found"})).unwrap_err();
        assert!(matches!(err, ApiError::Rejected(ref m) if m == "Video not found"));
    }

    #[test]
    fn status_zero_without_message_uses_fallback() {
        let err = check_status(json!({"status": 0})).unwrap_err();
        assert_eq!(err.to_string(), "provider rejected request: API request indicated failure.");
    }

    #[tokio::test]
    async fn call_uses_scoped_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/youtube/info"))
            .and(header("x-api-key", "scoped-key-123"))
            .and(query_param("url", "https://youtu.be/x"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": 1, "data": {"title": "t"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let body = CredentialScope::run(Some(Credential::new("scoped-key-123")), async {
            api.call(Endpoint::Info, &[("url".into(), "https://youtu.be/x".into())])
                .await
        })
        .await
        .unwrap();

        assert_eq!(body["data"]["title"], "t");
        assert_eq!(api.cache().len(), 1);
    }

    #[tokio::test]
    async fn call_without_credential_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let err = CredentialScope::run(None, async { api.call(Endpoint::Media, &[]).await })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingCredential));
    }

    #[tokio::test]
    async fn repeated_query_for_multiple_screenshots() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/youtube/screenshot-multiple"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let query = vec![
            ("url".to_string(), "https://youtu.be/x".to_string()),
            ("second".to_string(), "1".to_string()),
            ("second".to_string(), "2".to_string()),
        ];
        CredentialScope::run(Some(Credential::new("scoped-key-123")), async {
            api.call(Endpoint::ScreenshotMultiple, &query).await
        })
        .await
        .unwrap();

        let requests = server.received_requests().await.unwrap();
        let seconds: Vec<_> = requests[0]
            .url
            .query_pairs()
            .filter(|(k, _)| k == "second")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(seconds, vec!["1", "2"]);
    }
}
