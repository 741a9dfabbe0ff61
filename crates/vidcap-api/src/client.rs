use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response};
use vidcap_core::Credential;

use crate::error::{ApiError, AuthFailure};

pub const DEFAULT_BASE_URL: &str = "https://vidcap.xyz/api/v1";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const CREDENTIAL_HEADER: &str = "x-api-key";

/// Settings shared by every client the cache builds.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
            user_agent: format!("vidcap-mcp/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// A downstream HTTP client bound to one credential.
#[derive(Debug)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(credential: &Credential, config: &ClientConfig) -> Result<Self, ApiError> {
        let mut key = HeaderValue::from_str(credential.expose())
            .map_err(|e| ApiError::Build(format!("credential is not a valid header value: {e}")))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CREDENTIAL_HEADER, key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base_url}{path}` and decode the JSON body.
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<serde_json::Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, params = query.len(), "downstream GET");

        let response = self.http.get(&url).query(query).send().await?;
        let response = observe(response).await?;
        Ok(response.json().await?)
    }
}

/// Response hook: flags credential failures for logging and turns non-2xx
/// statuses into [`ApiError::Status`]. The error itself is not altered by
/// the classification.
async fn observe(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match AuthFailure::from_status(status.as_u16()) {
        Some(AuthFailure::Authentication) => {
            tracing::error!(status = status.as_u16(), "API key authentication failed");
        }
        Some(AuthFailure::Authorization) => {
            tracing::error!(status = status.as_u16(), "API key authorization failed");
        }
        None => {
            tracing::warn!(status = status.as_u16(), "downstream request failed");
        }
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> ClientConfig {
        ClientConfig {
            base_url: server.uri(),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn default_config_values() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.base_url, "https://vidcap.xyz/api/v1");
        assert_eq!(cfg.timeout, Duration::from_secs(30));
    }

    #[test]
    fn rejects_credential_with_control_characters() {
        let result = ApiClient::new(&Credential::new("bad\nkey-value"), &ClientConfig::default());
        assert!(matches!(result, Err(ApiError::Build(_))));
    }

    #[test]
    fn trims_trailing_slash() {
        let cfg = ClientConfig {
            base_url: "http://localhost:9/api/".into(),
            ..ClientConfig::default()
        };
        let client = ApiClient::new(&Credential::new("test-api-key"), &cfg).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9/api");
    }

    #[tokio::test]
    async fn sends_credential_and_content_type_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/youtube/info"))
            .and(header("x-api-key", "test-api-key"))
            .and(header("content-type", "application/json"))
            .and(query_param("url", "https://youtu.be/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&Credential::new("test-api-key"), &config_for(&server)).unwrap();
        let body = client
            .get_json("/youtube/info", &[("url".into(), "https://youtu.be/abc".into())])
            .await
            .unwrap();
        assert_eq!(body["status"], 1);
    }

    #[tokio::test]
    async fn unauthorized_surfaces_status_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let client = ApiClient::new(&Credential::new("revoked-key-1"), &config_for(&server)).unwrap();
        let err = client.get_json("/youtube/info", &[]).await.unwrap_err();
        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Unauthorized");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn forbidden_is_classified_as_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .mount(&server)
            .await;

        let client = ApiClient::new(&Credential::new("limited-key-1"), &config_for(&server)).unwrap();
        let err = client.get_json("/youtube/media", &[]).await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.error_kind(), "authorization_failed");
    }

    #[tokio::test]
    async fn non_json_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = ApiClient::new(&Credential::new("test-api-key"), &config_for(&server)).unwrap();
        let err = client.get_json("/youtube/info", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)), "got {err:?}");
    }
}
