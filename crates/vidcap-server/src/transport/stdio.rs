//! Newline-delimited JSON-RPC over a byte pipe.
//!
//! One peer, no session registry, no session id. Messages are handled in
//! the order they are read.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use vidcap_core::errors::TransportError;
use vidcap_core::tools::{Notifier, ToolContext};

use crate::mcp::McpServer;
use crate::rpc::Payload;

struct LineNotifier(mpsc::UnboundedSender<Value>);

impl Notifier for LineNotifier {
    fn notify(&self, message: Value) -> Result<(), TransportError> {
        self.0.send(message).map_err(|_| TransportError::Closed)
    }
}

/// Serve until `reader` reaches EOF.
pub async fn serve_stdio<R, W>(server: Arc<McpServer>, reader: R, writer: W) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<Value>();
    let writer_task = tokio::spawn(write_lines(writer, rx));

    let ctx = ToolContext {
        session_id: None,
        notifier: Arc::new(LineNotifier(tx.clone())),
    };

    let mut lines = BufReader::new(reader).lines();
    let read_result = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(e) => break Err(TransportError::Io(e.to_string())),
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = match Payload::parse(line.as_bytes()) {
            Ok(payload) => server.dispatch(payload, &ctx).await,
            Err(resp) => Some(resp.to_value()),
        };
        if let Some(reply) = reply {
            if tx.send(reply).is_err() {
                break Err(TransportError::Closed);
            }
        }
    };

    drop(ctx);
    drop(tx);
    let write_result = writer_task
        .await
        .map_err(|e| TransportError::Io(e.to_string()))?;

    tracing::info!("stdio transport finished");
    read_result.and(write_result)
}

async fn write_lines<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Value>) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = serde_json::to_vec(&message).map_err(|e| TransportError::Io(e.to_string()))?;
        line.push(b'\n');
        writer
            .write_all(&line)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        writer.flush().await.map_err(|e| TransportError::Io(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::ServerInfo;
    use tokio::io::{duplex, AsyncReadExt};
    use vidcap_tools::ToolRegistry;

    fn server() -> Arc<McpServer> {
        Arc::new(McpServer::new(ServerInfo::default(), Arc::new(ToolRegistry::new())))
    }

    async fn run(input: &str) -> Vec<Value> {
        let (mut client_in, server_in) = duplex(4096);
        let (server_out, mut client_out) = duplex(4096);

        client_in.write_all(input.as_bytes()).await.unwrap();
        drop(client_in);

        serve_stdio(server(), server_in, server_out).await.unwrap();

        let mut out = String::new();
        client_out.read_to_string(&mut out).await.unwrap();
        out.lines().map(|l| serde_json::from_str(l).unwrap()).collect()
    }

    #[tokio::test]
    async fn answers_requests_in_order() {
        let out = run(concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26"}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
            "\n",
        ))
        .await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["id"], 1);
        assert_eq!(out[0]["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(out[1]["id"], 2);
    }

    #[tokio::test]
    async fn malformed_line_gets_parse_error() {
        let out = run("{oops\n").await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["error"]["code"], -32700);
        assert!(out[0]["id"].is_null());
    }
}
