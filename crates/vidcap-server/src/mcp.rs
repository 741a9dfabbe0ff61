//! MCP request dispatch.

use std::sync::Arc;

use serde_json::{json, Value};
use vidcap_core::tools::{ToolContext, ToolError, ToolOutput};
use vidcap_tools::ToolRegistry;

use crate::rpc::{self, Payload, RpcRequest, RpcResponse};

/// Newest protocol revision this server speaks. Echoed back when the client
/// does not name one.
pub const LATEST_PROTOCOL_VERSION: &str = "2025-03-26";

#[derive(Clone, Debug)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "vidcap-mcp".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Stateless JSON-RPC dispatcher shared by every transport and session.
pub struct McpServer {
    info: ServerInfo,
    tools: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(info: ServerInfo, tools: Arc<ToolRegistry>) -> Self {
        Self { info, tools }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Dispatch a payload. Returns the value to write back, or `None` when
    /// every message was a notification.
    pub async fn dispatch(&self, payload: Payload, ctx: &ToolContext) -> Option<Value> {
        match payload {
            Payload::Single(message) => self.handle(message, ctx).await.map(|r| r.to_value()),
            Payload::Batch(messages) => {
                let mut responses = Vec::with_capacity(messages.len());
                for message in messages {
                    if let Some(resp) = self.handle(message, ctx).await {
                        responses.push(resp.to_value());
                    }
                }
                (!responses.is_empty()).then_some(Value::Array(responses))
            }
        }
    }

    /// Handle one message. Notifications and stray responses produce `None`.
    pub async fn handle(&self, message: Value, ctx: &ToolContext) -> Option<RpcResponse> {
        if message.get("method").is_none() && (message.get("result").is_some() || message.get("error").is_some()) {
            tracing::debug!("ignoring client response message");
            return None;
        }

        let request: RpcRequest = match serde_json::from_value(message) {
            Ok(req) => req,
            Err(e) => {
                return Some(RpcResponse::invalid_request(Value::Null, format!("Invalid Request: {e}")));
            }
        };

        if request.is_notification() {
            self.handle_notification(&request);
            return None;
        }

        let id = request.id.clone().unwrap_or(Value::Null);
        let params = request.params.unwrap_or_else(|| json!({}));
        let response = match request.method.as_str() {
            "initialize" => RpcResponse::success(id, self.initialize(&params)),
            "ping" => RpcResponse::success(id, json!({})),
            "tools/list" => RpcResponse::success(id, json!({ "tools": self.tools.definitions() })),
            "tools/call" => self.call_tool(id, &params, ctx).await,
            other => {
                tracing::debug!(method = other, "unknown method");
                RpcResponse::method_not_found(id, other)
            }
        };
        Some(response)
    }

    fn handle_notification(&self, request: &RpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => tracing::debug!("client initialized"),
            "notifications/cancelled" => tracing::debug!("client cancelled a request"),
            other => tracing::debug!(method = other, "ignoring notification"),
        }
    }

    fn initialize(&self, params: &Value) -> Value {
        let version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(LATEST_PROTOCOL_VERSION);
        if let Some(client) = params.pointer("/clientInfo/name").and_then(Value::as_str) {
            tracing::info!(client, protocol_version = version, "initialize");
        }
        json!({
            "protocolVersion": version,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": { "name": self.info.name, "version": self.info.version },
        })
    }

    async fn call_tool(&self, id: Value, params: &Value, ctx: &ToolContext) -> RpcResponse {
        let name = match rpc::require_str(params, "name") {
            Ok(name) => name,
            Err(msg) => return RpcResponse::invalid_params(id, msg),
        };
        let Some(tool) = self.tools.get(name) else {
            return RpcResponse::invalid_params(id, format!("Unknown tool: {name}"));
        };

        let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
        let progress_token = params.pointer("/_meta/progressToken").cloned();

        if let Some(token) = &progress_token {
            send_progress(ctx, token, 0);
        }

        let started = std::time::Instant::now();
        let output = match tool.execute(args, ctx).await {
            Ok(output) => output,
            Err(ToolError::InvalidArguments(msg)) => {
                return RpcResponse::invalid_params(id, format!("Invalid arguments for tool {name}: {msg}"));
            }
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "tool call failed");
                ToolOutput::error(format!("Error: {e}"))
            }
        };

        if let Some(token) = &progress_token {
            send_progress(ctx, token, 1);
        }

        tracing::debug!(
            tool = name,
            is_error = output.is_error,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tool call finished"
        );

        match serde_json::to_value(&output) {
            Ok(result) => RpcResponse::success(id, result),
            Err(e) => RpcResponse::internal_error(id, e.to_string()),
        }
    }
}

fn send_progress(ctx: &ToolContext, token: &Value, progress: u64) {
    let message = rpc::notification(
        "notifications/progress",
        json!({ "progressToken": token, "progress": progress, "total": 1 }),
    );
    if let Err(e) = ctx.notifier.notify(message) {
        tracing::debug!(error = %e, "progress notification dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use vidcap_core::errors::TransportError;
    use vidcap_core::tools::{Notifier, Tool};
    use vidcap_tools::ToolSource;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the text argument"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }
        async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
            match args.get("text").and_then(Value::as_str) {
                Some("fail") => Err(ToolError::ExecutionFailed("boom".into())),
                Some(text) => Ok(ToolOutput::text(text)),
                None => Err(ToolError::InvalidArguments("text is required".into())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingNotifier(Mutex<Vec<Value>>);

    impl Notifier for RecordingNotifier {
        fn notify(&self, message: Value) -> Result<(), TransportError> {
            self.0.lock().push(message);
            Ok(())
        }
    }

    fn server() -> McpServer {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool), ToolSource::Vidcap);
        McpServer::new(ServerInfo::default(), Arc::new(registry))
    }

    async fn call(server: &McpServer, message: Value) -> Value {
        server
            .handle(message, &ToolContext::detached())
            .await
            .map(|r| r.to_value())
            .unwrap_or(Value::Null)
    }

    #[tokio::test]
    async fn initialize_echoes_protocol_version() {
        let resp = call(
            &server(),
            json!({"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"t","version":"1"}}}),
        )
        .await;
        assert_eq!(resp["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(resp["result"]["serverInfo"]["name"], "vidcap-mcp");
        assert!(resp["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let out = server()
            .handle(json!({"jsonrpc":"2.0","method":"notifications/initialized"}), &ToolContext::detached())
            .await;
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn unknown_method() {
        let resp = call(&server(), json!({"jsonrpc":"2.0","id":7,"method":"resources/list"})).await;
        assert_eq!(resp["error"]["code"], -32601);
        assert_eq!(resp["id"], 7);
    }

    #[tokio::test]
    async fn tools_list_includes_schema() {
        let resp = call(&server(), json!({"jsonrpc":"2.0","id":2,"method":"tools/list"})).await;
        let tools = resp["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "echo");
        assert_eq!(tools[0]["inputSchema"]["type"], "object");
    }

    #[tokio::test]
    async fn tools_call_success_and_failure() {
        let server = server();
        let ok = call(
            &server,
            json!({"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"echo","arguments":{"text":"hi"}}}),
        )
        .await;
        assert_eq!(ok["result"]["content"][0]["text"], "hi");
        assert!(ok["result"].get("isError").is_none());

        let failed = call(
            &server,
            json!({"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"echo","arguments":{"text":"fail"}}}),
        )
        .await;
        assert_eq!(failed["result"]["isError"], true);
        assert!(failed["result"]["content"][0]["text"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn tools_call_bad_params() {
        let server = server();
        let missing_name = call(&server, json!({"jsonrpc":"2.0","id":5,"method":"tools/call","params":{}})).await;
        assert_eq!(missing_name["error"]["code"], -32602);

        let unknown = call(
            &server,
            json!({"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"nope"}}),
        )
        .await;
        assert_eq!(unknown["error"]["code"], -32602);

        let bad_args = call(
            &server,
            json!({"jsonrpc":"2.0","id":8,"method":"tools/call","params":{"name":"echo","arguments":{}}}),
        )
        .await;
        assert_eq!(bad_args["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn progress_token_emits_notifications() {
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = ToolContext {
            session_id: None,
            notifier: notifier.clone(),
        };
        server()
            .handle(
                json!({"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"name":"echo","arguments":{"text":"x"},"_meta":{"progressToken":"tok"}}}),
                &ctx,
            )
            .await
            .unwrap();

        let sent = notifier.0.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["method"], "notifications/progress");
        assert_eq!(sent[0]["params"]["progressToken"], "tok");
        assert_eq!(sent[1]["params"]["progress"], 1);
    }

    #[tokio::test]
    async fn batch_skips_notifications() {
        let payload = Payload::parse(
            br#"[{"jsonrpc":"2.0","method":"notifications/initialized"},{"jsonrpc":"2.0","id":1,"method":"ping"}]"#,
        )
        .unwrap();
        let out = server().dispatch(payload, &ToolContext::detached()).await.unwrap();
        let arr = out.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["id"], 1);

        let only_notes = Payload::parse(br#"[{"jsonrpc":"2.0","method":"notifications/initialized"}]"#).unwrap();
        assert!(server().dispatch(only_notes, &ToolContext::detached()).await.is_none());
    }
}
