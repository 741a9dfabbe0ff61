//! Two-endpoint SSE transport: `GET /sse` pushes, `POST /messages` pulls.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use vidcap_core::errors::TransportError;
use vidcap_core::{SessionId, TransportKind};

use crate::session::{SessionRegistry, SessionTransport};

pub const MESSAGES_PATH: &str = "/messages";

#[derive(Clone, Debug, PartialEq)]
pub enum LegacyEvent {
    /// First event on every stream: where to POST messages.
    Endpoint(String),
    Message(Value),
}

impl LegacyEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Endpoint(_) => "endpoint",
            Self::Message(_) => "message",
        }
    }

    pub fn data(&self) -> String {
        match self {
            Self::Endpoint(uri) => uri.clone(),
            Self::Message(message) => message.to_string(),
        }
    }
}

pub struct LegacySseTransport {
    tx: Mutex<Option<mpsc::UnboundedSender<LegacyEvent>>>,
}

impl LegacySseTransport {
    /// Create the transport and its event receiver. The endpoint event is
    /// already queued.
    pub fn open(session_id: &SessionId) -> (Self, mpsc::UnboundedReceiver<LegacyEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let endpoint = format!("{MESSAGES_PATH}?sessionId={session_id}");
        let _ = tx.send(LegacyEvent::Endpoint(endpoint));
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

#[async_trait]
impl SessionTransport for LegacySseTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Legacy
    }

    fn send(&self, message: Value) -> Result<(), TransportError> {
        let slot = self.tx.lock();
        let tx = slot.as_ref().ok_or(TransportError::Closed)?;
        tx.send(LegacyEvent::Message(message))
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.tx.lock().take();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Removes a session from the registry when dropped. Held by the SSE
/// response stream so a client disconnect ends the session.
pub struct RemoveOnDrop {
    registry: Arc<SessionRegistry>,
    session_id: SessionId,
    kind: TransportKind,
}

impl RemoveOnDrop {
    pub fn new(registry: Arc<SessionRegistry>, session_id: SessionId, kind: TransportKind) -> Self {
        Self {
            registry,
            session_id,
            kind,
        }
    }
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        if self.registry.remove(&self.session_id, self.kind).is_some() {
            tracing::info!(session_id = %self.session_id, transport = %self.kind, "stream disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn endpoint_event_comes_first() {
        let id = SessionId::parse("sess_abc").unwrap();
        let (transport, mut rx) = LegacySseTransport::open(&id);
        transport.send(json!({"id": 1})).unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event_name(), "endpoint");
        assert_eq!(first.data(), "/messages?sessionId=sess_abc");

        let second = rx.recv().await.unwrap();
        assert_eq!(second.event_name(), "message");
        assert_eq!(second.data(), r#"{"id":1}"#);
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let (transport, _rx) = LegacySseTransport::open(&SessionId::new());
        transport.close().await.unwrap();
        assert!(matches!(transport.send(json!(1)), Err(TransportError::Closed)));
    }

    #[test]
    fn send_after_receiver_dropped_fails() {
        let (transport, rx) = LegacySseTransport::open(&SessionId::new());
        drop(rx);
        assert!(transport.send(json!(1)).is_err());
    }

    #[test]
    fn guard_removes_session() {
        let registry = Arc::new(SessionRegistry::new());
        let resolved = registry.resolve(None, TransportKind::Legacy, |id| {
            let (t, _rx) = LegacySseTransport::open(id);
            Arc::new(t)
        });
        let id = resolved.session.id().clone();

        let guard = RemoveOnDrop::new(Arc::clone(&registry), id.clone(), TransportKind::Legacy);
        assert!(registry.get(&id, TransportKind::Legacy).is_some());
        drop(guard);
        assert!(registry.get(&id, TransportKind::Legacy).is_none());
        assert_eq!(registry.counts().legacy, 0);
    }
}
