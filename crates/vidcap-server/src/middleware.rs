//! Per-request credential extraction.

use axum::extract::{Query, Request, State};
use axum::http::{StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use vidcap_core::{Credential, CredentialFormatError, CredentialScope};

pub const API_KEY_PARAM: &str = "api_key";

#[derive(Clone, Copy, Debug, Default)]
pub struct CredentialPolicy {
    /// Warn about credentials sent over plain HTTP. Request URIs seen by the
    /// server rarely carry a scheme, so behind a TLS-terminating proxy this
    /// relies on the proxy setting `x-forwarded-proto: https`.
    pub production: bool,
}

/// Read `?api_key=` and run the rest of the request inside a
/// [`CredentialScope`] bound to it. Malformed keys are rejected with 400
/// before any handler runs.
pub async fn credential_scope(State(policy): State<CredentialPolicy>, request: Request, next: Next) -> Response {
    let credential = match credential_from_uri(request.uri()) {
        Ok(credential) => credential,
        Err(e) => {
            tracing::warn!(length = e.length, path = %request.uri().path(), "rejecting malformed API key");
            return invalid_key_response();
        }
    };

    if credential.is_some() && policy.production && !is_https(&request) {
        tracing::warn!(path = %request.uri().path(), "API key received over plain HTTP in production");
    }

    CredentialScope::run(credential, next.run(request)).await
}

/// The single `api_key` query value, validated. Absent, empty, or repeated
/// parameters yield `Ok(None)`.
pub fn credential_from_uri(uri: &Uri) -> Result<Option<Credential>, CredentialFormatError> {
    let Ok(Query(pairs)) = Query::<Vec<(String, String)>>::try_from_uri(uri) else {
        return Ok(None);
    };

    let mut values = pairs.into_iter().filter(|(k, _)| k == API_KEY_PARAM).map(|(_, v)| v);
    match (values.next(), values.next()) {
        (Some(value), None) if !value.is_empty() => Credential::parse(&value).map(Some),
        (Some(_), Some(_)) => {
            tracing::debug!("repeated api_key parameter ignored");
            Ok(None)
        }
        _ => Ok(None),
    }
}

fn is_https(request: &Request) -> bool {
    if request.uri().scheme_str() == Some("https") {
        return true;
    }
    request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

fn invalid_key_response() -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid API key format" }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn single_key_is_parsed() {
        let credential = credential_from_uri(&uri("/mcp?api_key=abcdefghij")).unwrap().unwrap();
        assert_eq!(credential.expose(), "abcdefghij");
    }

    #[test]
    fn missing_or_empty_key_is_none() {
        assert!(credential_from_uri(&uri("/mcp")).unwrap().is_none());
        assert!(credential_from_uri(&uri("/mcp?other=1")).unwrap().is_none());
        assert!(credential_from_uri(&uri("/mcp?api_key=")).unwrap().is_none());
    }

    #[test]
    fn repeated_key_is_none() {
        let parsed = credential_from_uri(&uri("/mcp?api_key=abcdefghij&api_key=klmnopqrst")).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn length_bounds() {
        let nine = format!("/x?api_key={}", "a".repeat(9));
        let ten = format!("/x?api_key={}", "a".repeat(10));
        let max = format!("/x?api_key={}", "a".repeat(200));
        let over = format!("/x?api_key={}", "a".repeat(201));
        assert!(credential_from_uri(&uri(&nine)).is_err());
        assert!(credential_from_uri(&uri(&ten)).unwrap().is_some());
        assert!(credential_from_uri(&uri(&max)).unwrap().is_some());
        assert!(credential_from_uri(&uri(&over)).is_err());
    }

    fn echo_router() -> Router {
        Router::new()
            .route(
                "/echo",
                get(|| async { CredentialScope::scoped().map(|c| c.expose().to_string()).unwrap_or_default() }),
            )
            .layer(axum::middleware::from_fn_with_state(CredentialPolicy::default(), credential_scope))
    }

    #[tokio::test]
    async fn handler_sees_scoped_credential() {
        let response = echo_router()
            .oneshot(Request::get("/echo?api_key=abcdefghijkl").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"abcdefghijkl");
    }

    #[tokio::test]
    async fn short_key_rejected_before_handler() {
        let response = echo_router()
            .oneshot(Request::get("/echo?api_key=short").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Invalid API key format");
    }

    #[test]
    fn plain_origin_path_is_https_only_via_forwarded_proto() {
        let bare = Request::get("/mcp?api_key=abcdefghij").body(Body::empty()).unwrap();
        assert!(!is_https(&bare));

        let proxied = Request::get("/mcp?api_key=abcdefghij")
            .header("x-forwarded-proto", "HTTPS")
            .body(Body::empty())
            .unwrap();
        assert!(is_https(&proxied));

        let absolute = Request::get("https://vidcap.example/mcp").body(Body::empty()).unwrap();
        assert!(is_https(&absolute));
    }
}
