//! Layered settings.
//!
//! 1. Compiled defaults ([`Settings::default`])
//! 2. `~/.vidcap/settings.json`, deep-merged over the defaults
//! 3. Environment variables (highest priority)
//!
//! Field names in the settings file are camelCase. Missing fields keep their
//! default; invalid environment values are ignored with a warning.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vidcap_api::{DEFAULT_BASE_URL, DEFAULT_SCREENSHOT_BASE_URL};
use vidcap_telemetry::LogFormat;

use crate::event_store::DEFAULT_EVENT_CAPACITY;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub server: ServerSettings,
    pub vidcap: VidcapSettings,
    pub screenshot: ScreenshotSettings,
    pub logging: LoggingSettings,
    /// Enables production-only warnings such as plain-HTTP credentials.
    pub production: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Base path of the streamable HTTP endpoint.
    pub path: String,
    /// Events kept per multiplexed session for `last-event-id` replay.
    pub event_capacity: usize,
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            path: "/mcp".to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VidcapSettings {
    /// Fallback credential when a request carries none.
    #[serde(skip_serializing)]
    pub api_key: Option<SecretString>,
    pub base_url: String,
}

impl Default for VidcapSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScreenshotSettings {
    #[serde(skip_serializing)]
    pub access_key: Option<SecretString>,
    pub base_url: String,
}

impl Default for ScreenshotSettings {
    fn default() -> Self {
        Self {
            access_key: None,
            base_url: DEFAULT_SCREENSHOT_BASE_URL.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub debug: bool,
    pub format: LogFormat,
}

/// `~/.vidcap/settings.json`, if a home directory is known.
pub fn settings_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".vidcap").join("settings.json"))
}

/// Load from the default path and the process environment. Falls back to
/// defaults (plus environment) when the file is unreadable.
pub fn load_settings() -> Settings {
    let mut settings = match settings_path() {
        Some(path) => load_settings_from_path(&path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            Settings::default()
        }),
        None => Settings::default(),
    };
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// Defaults deep-merged with the file at `path`. A missing file is not an
/// error. Environment overrides are not applied.
pub fn load_settings_from_path(path: &Path) -> Result<Settings, SettingsError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let user: Value = serde_json::from_str(&raw)?;
    let merged = deep_merge(serde_json::to_value(Settings::default())?, user);
    let settings = serde_json::from_value(merged)?;
    tracing::debug!(?path, "settings loaded");
    Ok(settings)
}

/// Merge `overlay` into `base`. Objects merge key by key; any other value in
/// `overlay` replaces the one in `base`. Explicit `null` leaves `base` intact.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Apply environment overrides read through `lookup`.
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(host) = get("MCP_HTTP_HOST") {
        settings.server.host = host;
    }
    if let Some(raw) = get("MCP_HTTP_PORT") {
        match parse_port(&raw) {
            Some(port) => settings.server.port = port,
            None => tracing::warn!(value = %raw, "ignoring invalid MCP_HTTP_PORT"),
        }
    }
    if let Some(path) = get("MCP_HTTP_PATH") {
        if path.starts_with('/') {
            settings.server.path = path;
        } else {
            tracing::warn!(value = %path, "ignoring MCP_HTTP_PATH without leading slash");
        }
    }
    if let Some(raw) = get("DEBUG") {
        match parse_bool(&raw) {
            Some(debug) => settings.logging.debug = debug,
            None => tracing::warn!(value = %raw, "ignoring invalid DEBUG"),
        }
    }
    if let Some(raw) = get("VIDCAP_LOG_FORMAT") {
        match LogFormat::parse(&raw) {
            Some(format) => settings.logging.format = format,
            None => tracing::warn!(value = %raw, "ignoring invalid VIDCAP_LOG_FORMAT"),
        }
    }
    if let Some(key) = get("VIDCAP_API_KEY") {
        settings.vidcap.api_key = Some(SecretString::from(key));
    }
    if let Some(url) = get("VIDCAP_API_BASE_URL") {
        settings.vidcap.base_url = url;
    }
    if let Some(key) = get("SCREENSHOTONE_ACCESS_KEY") {
        settings.screenshot.access_key = Some(SecretString::from(key));
    }
    if let Some(env) = get("VIDCAP_ENV").or_else(|| get("NODE_ENV")) {
        settings.production = env.eq_ignore_ascii_case("production");
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_port(raw: &str) -> Option<u16> {
    raw.parse::<u16>().ok().filter(|port| *port != 0)
}
