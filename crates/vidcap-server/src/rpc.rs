use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
/// Server-defined: a request arrived outside any session and did not open one.
pub const NO_VALID_SESSION: i32 = -32000;
/// Server-defined: the addressed session does not exist.
pub const SESSION_NOT_FOUND: i32 = -32001;

/// JSON-RPC 2.0 request or notification. A missing `id` marks a
/// notification, which never receives a response.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

impl RpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    /// `null` when the request id could not be determined.
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    pub fn method_not_found(id: Value, method: &str) -> Self {
        Self::error(id, METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(id: Value, msg: impl Into<String>) -> Self {
        Self::error(id, INVALID_PARAMS, msg)
    }

    pub fn invalid_request(id: Value, msg: impl Into<String>) -> Self {
        Self::error(id, INVALID_REQUEST, msg)
    }

    pub fn internal_error(id: Value, msg: impl Into<String>) -> Self {
        Self::error(id, INTERNAL_ERROR, msg)
    }

    pub fn parse_error() -> Self {
        Self::error(Value::Null, PARSE_ERROR, "Parse error")
    }

    pub fn no_valid_session() -> Self {
        Self::error(Value::Null, NO_VALID_SESSION, "Bad Request: No valid session ID provided")
    }

    pub fn session_not_found() -> Self {
        Self::error(Value::Null, SESSION_NOT_FOUND, "Session not found")
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A server-initiated notification.
pub fn notification(method: &str, params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": method,
        "params": params,
    })
}

/// One inbound HTTP or line payload: a single message or a batch.
#[derive(Debug)]
pub enum Payload {
    Single(Value),
    Batch(Vec<Value>),
}

impl Payload {
    /// Parse raw bytes. Malformed JSON, an empty batch, or a bare scalar
    /// yields the error response to send back.
    pub fn parse(raw: &[u8]) -> Result<Self, RpcResponse> {
        let value: Value = serde_json::from_slice(raw).map_err(|_| RpcResponse::parse_error())?;
        match value {
            Value::Array(items) if items.is_empty() => Err(RpcResponse::invalid_request(
                Value::Null,
                "Empty batch",
            )),
            Value::Array(items) => Ok(Self::Batch(items)),
            Value::Object(_) => Ok(Self::Single(value)),
            _ => Err(RpcResponse::invalid_request(Value::Null, "Invalid Request")),
        }
    }

    pub fn messages(&self) -> &[Value] {
        match self {
            Self::Single(v) => std::slice::from_ref(v),
            Self::Batch(items) => items,
        }
    }

    /// Whether any message in the payload is an `initialize` request.
    pub fn has_initialize(&self) -> bool {
        self.messages()
            .iter()
            .any(|m| m.get("method").and_then(Value::as_str) == Some("initialize"))
    }
}

/// Extract a required string param from the RPC params object.
pub fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("Missing required parameter: {key}"))
}
