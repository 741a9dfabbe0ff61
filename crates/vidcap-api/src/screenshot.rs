//! ScreenshotOne `/take` client.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::query::to_query_pairs;

pub const DEFAULT_SCREENSHOT_BASE_URL: &str = "https://api.screenshotone.com";
const TAKE_PATH: &str = "/take";

/// Result of a capture.
#[derive(Clone, Debug, PartialEq)]
pub enum Screenshot {
    /// `response_type=json`: the provider's JSON answer.
    Json(Value),
    /// Rendered image or document bytes.
    Binary { bytes: Bytes, content_type: Option<String> },
}

pub struct ScreenshotApi {
    http: Client,
    base_url: String,
    access_key: Option<SecretString>,
}

impl ScreenshotApi {
    pub fn new(
        base_url: impl Into<String>,
        access_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_key,
        })
    }

    pub fn has_default_key(&self) -> bool {
        self.access_key.is_some()
    }

    /// Take a screenshot. `options` are forwarded verbatim except for
    /// `access_key` (falls back to the configured key) and `url`
    /// (normalized to carry a scheme).
    ///
    /// HTML captures go out as a JSON POST; URL captures as a GET with the
    /// options encoded in the query string.
    pub async fn take(&self, mut options: Map<String, Value>) -> Result<Screenshot, ApiError> {
        let access_key = match options.remove("access_key") {
            Some(Value::String(key)) if !key.is_empty() => key,
            _ => self
                .access_key
                .as_ref()
                .map(|k| k.expose_secret().to_string())
                .ok_or(ApiError::MissingAccessKey)?,
        };

        if let Some(Value::String(url)) = options.get("url") {
            let normalized = normalize_url(url);
            options.insert("url".into(), Value::String(normalized));
        }

        let wants_json = options.get("response_type").and_then(Value::as_str) == Some("json");
        let endpoint = format!("{}{}", self.base_url, TAKE_PATH);

        let request = if options.contains_key("html") {
            tracing::debug!(fields = options.len(), "screenshot via POST");
            let mut body = options;
            body.insert("access_key".into(), Value::String(access_key));
            self.http.post(&endpoint).json(&body)
        } else {
            tracing::debug!(fields = options.len(), "screenshot via GET");
            let mut query = vec![("access_key".to_string(), access_key)];
            query.extend(to_query_pairs(&options));
            self.http.get(&endpoint).query(&query)
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let message = provider_error_message(&body);
            tracing::warn!(status = status.as_u16(), %message, "screenshot request failed");
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: message,
            });
        }

        if wants_json {
            return Ok(Screenshot::Json(response.json().await?));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        Ok(Screenshot::Binary {
            bytes,
            content_type,
        })
    }
}

/// Prefix `https://` unless the URL already names http or https.
pub fn normalize_url(url: &str) -> String {
    let lower = url.to_ascii_lowercase();
    if url.is_empty() || lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// MIME type for a `format` option. Unknown formats are treated as PNG.
pub fn mime_type_for(format: &str) -> &'static str {
    match format.to_ascii_lowercase().as_str() {
        "jpeg" | "jpg" => "image/jpeg",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        _ => "image/png",
    }
}

fn provider_error_message(body: &[u8]) -> String {
    let Ok(parsed) = serde_json::from_slice::<Value>(body) else {
        return format!("ScreenshotOne API error: {}", String::from_utf8_lossy(body));
    };

    let mut message = parsed
        .get("error_message")
        .and_then(Value::as_str)
        .or_else(|| parsed.pointer("/error/message").and_then(Value::as_str))
        .unwrap_or("Unknown error from ScreenshotOne API")
        .to_string();

    if let Some(details) = parsed.get("error_details").and_then(Value::as_array) {
        let joined: Vec<&str> = details
            .iter()
            .filter_map(|d| d.get("message").and_then(Value::as_str))
            .collect();
        if !joined.is_empty() {
            message = format!("{message}: {}", joined.join("; "));
        }
    }
    message
}
