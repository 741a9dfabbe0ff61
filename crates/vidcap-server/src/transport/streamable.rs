//! Streamable HTTP transport state for one multiplexed session.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use vidcap_core::errors::TransportError;
use vidcap_core::{EventId, SessionId, TransportKind};

use crate::event_store::EventStore;
use crate::session::SessionTransport;

type StreamItem = (EventId, Value);

/// Server-to-client channel of a multiplexed session.
///
/// Messages are recorded in the session's [`EventStore`] and forwarded to
/// the currently attached GET stream, if any. At most one stream is
/// attached; opening a new one detaches the previous.
pub struct StreamableTransport {
    session_id: SessionId,
    events: EventStore,
    stream: Mutex<Option<mpsc::UnboundedSender<StreamItem>>>,
    closed: AtomicBool,
}

impl StreamableTransport {
    pub fn new(session_id: SessionId, event_capacity: usize) -> Self {
        Self {
            session_id,
            events: EventStore::new(event_capacity),
            stream: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Attach a new stream. With `last_event_id`, events recorded after it
    /// are delivered first; an id no longer in the store replays nothing.
    pub fn open_stream(
        &self,
        last_event_id: Option<&EventId>,
    ) -> Result<UnboundedReceiverStream<StreamItem>, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut slot = self.stream.lock();

        if let Some(last) = last_event_id {
            match self.events.replay_after(last) {
                Some(missed) => {
                    tracing::info!(session_id = %self.session_id, last_event_id = %last, replayed = missed.len(), "resuming stream");
                    for item in missed {
                        let _ = tx.send(item);
                    }
                }
                None => {
                    tracing::warn!(session_id = %self.session_id, last_event_id = %last, "last-event-id not found, nothing replayed");
                }
            }
        }

        if slot.replace(tx).is_some() {
            tracing::debug!(session_id = %self.session_id, "replacing attached stream");
        }
        Ok(UnboundedReceiverStream::new(rx))
    }
}

#[async_trait]
impl SessionTransport for StreamableTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Multiplexed
    }

    fn send(&self, message: Value) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let mut slot = self.stream.lock();
        let id = self.events.append(message.clone());
        if let Some(tx) = slot.as_ref() {
            if tx.send((id, message)).is_err() {
                // Client went away; the event stays available for replay.
                *slot = None;
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::Release);
        self.stream.lock().take();
        tracing::debug!(session_id = %self.session_id, "streamable transport closed");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn transport() -> StreamableTransport {
        StreamableTransport::new(SessionId::new(), 16)
    }

    #[tokio::test]
    async fn attached_stream_receives_sends() {
        let t = transport();
        let mut stream = t.open_stream(None).unwrap();
        t.send(json!({"n": 1})).unwrap();
        let (_, msg) = stream.next().await.unwrap();
        assert_eq!(msg["n"], 1);
    }

    #[tokio::test]
    async fn send_without_stream_is_buffered_for_replay() {
        let t = transport();
        let mut first = t.open_stream(None).unwrap();
        t.send(json!(1)).unwrap();
        let (seen, _) = first.next().await.unwrap();
        drop(first);

        t.send(json!(2)).unwrap();
        t.send(json!(3)).unwrap();

        let resumed = t.open_stream(Some(&seen)).unwrap();
        t.close().await.unwrap();
        let values: Vec<Value> = resumed.map(|(_, v)| v).collect().await;
        assert_eq!(values, vec![json!(2), json!(3)]);
    }

    #[tokio::test]
    async fn closed_transport_rejects() {
        let t = transport();
        t.close().await.unwrap();
        assert!(matches!(t.send(json!(1)), Err(TransportError::Closed)));
        assert!(matches!(t.open_stream(None), Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn close_ends_attached_stream() {
        let t = transport();
        let mut stream = t.open_stream(None).unwrap();
        t.close().await.unwrap();
        assert!(stream.next().await.is_none());
    }
}
