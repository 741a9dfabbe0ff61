use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::TransportError;
use crate::ids::SessionId;

/// One block of tool output, in MCP content wire format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Result returned by a tool execution (`CallToolResult`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: Vec<Content>,
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(message)],
            is_error: true,
        }
    }
}

/// Tool definition advertised by `tools/list`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Outbound channel back to the peer that issued the current request.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: serde_json::Value) -> Result<(), TransportError>;
}

/// Notifier that drops every message. Used where no peer is listening.
pub struct DiscardNotifier;

impl Notifier for DiscardNotifier {
    fn notify(&self, _message: serde_json::Value) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Context available to tools during execution.
#[derive(Clone)]
pub struct ToolContext {
    /// `None` on the direct-pipe transport.
    pub session_id: Option<SessionId>,
    pub notifier: Arc<dyn Notifier>,
}

impl ToolContext {
    pub fn detached() -> Self {
        Self {
            session_id: None,
            notifier: Arc::new(DiscardNotifier),
        }
    }
}

/// Trait implemented by each tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> serde_json::Value;

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    /// A downstream provider call failed. `kind` is a short classification
    /// suitable for log fields.
    #[error("{message}")]
    Api { kind: &'static str, message: String },
}
