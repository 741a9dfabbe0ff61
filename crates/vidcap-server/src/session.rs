//! Session registry.
//!
//! Sessions live in one map per [`TransportKind`]; an id is only meaningful
//! together with its kind. Creation is a single synchronous entry insert, so
//! two concurrent requests can never both observe an id as free.
//!
//! Lifecycle: `pending -> active -> closing -> closed`. Transitions only move
//! forward. A removed id is never handed out again by [`SessionRegistry::get`].

use std::any::Any;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use vidcap_core::errors::{SessionCloseError, TransportError};
use vidcap_core::tools::Notifier;
use vidcap_core::{SessionId, TransportKind};

/// Outbound half of a connection bound to one session.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Queue a server-to-client message. Never blocks.
    fn send(&self, message: Value) -> Result<(), TransportError>;

    /// Stop delivering messages and release the connection.
    async fn close(&self) -> Result<(), TransportError>;

    fn as_any(&self) -> &dyn Any;
}

/// Forwards tool notifications onto a session's transport.
pub struct TransportNotifier(pub Arc<dyn SessionTransport>);

impl Notifier for TransportNotifier {
    fn notify(&self, message: Value) -> Result<(), TransportError> {
        self.0.send(message)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SessionState {
    Pending = 0,
    Active = 1,
    Closing = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Pending,
            1 => Self::Active,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

pub struct Session {
    id: SessionId,
    kind: TransportKind,
    transport: Arc<dyn SessionTransport>,
    created_at: DateTime<Utc>,
    state: AtomicU8,
    /// Serializes dispatch so a session's requests are handled in arrival
    /// order.
    dispatch: Mutex<()>,
}

impl Session {
    fn new(id: SessionId, kind: TransportKind, transport: Arc<dyn SessionTransport>) -> Self {
        Self {
            id,
            kind,
            transport,
            created_at: Utc::now(),
            state: AtomicU8::new(SessionState::Pending as u8),
            dispatch: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn transport(&self) -> &Arc<dyn SessionTransport> {
        &self.transport
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state(), SessionState::Pending | SessionState::Active)
    }

    /// Move `pending -> active`, running `on_initialized` on the transition.
    /// Returns `false` (without calling it) if the session already left
    /// `pending`.
    pub fn activate(&self, on_initialized: impl FnOnce(&SessionId)) -> bool {
        if self.advance(SessionState::Pending, SessionState::Active) {
            on_initialized(&self.id);
            true
        } else {
            false
        }
    }

    /// Wait for this session's turn to dispatch.
    pub async fn lock_dispatch(&self) -> MutexGuard<'_, ()> {
        self.dispatch.lock().await
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::new(TransportNotifier(Arc::clone(&self.transport)))
    }

    fn advance(&self, from: SessionState, to: SessionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move to `closing` from either open state.
    fn begin_close(&self) -> bool {
        self.advance(SessionState::Active, SessionState::Closing)
            || self.advance(SessionState::Pending, SessionState::Closing)
    }

    fn mark_closed(&self) {
        self.state.store(SessionState::Closed as u8, Ordering::Release);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Outcome of [`SessionRegistry::resolve`].
pub struct Resolved {
    pub session: Arc<Session>,
    pub created: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounts {
    pub multiplexed: usize,
    pub legacy: usize,
}

/// Maps session ids to live transports, one namespace per transport kind.
pub struct SessionRegistry {
    multiplexed: DashMap<SessionId, Arc<Session>>,
    legacy: DashMap<SessionId, Arc<Session>>,
    created_total: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            multiplexed: DashMap::new(),
            legacy: DashMap::new(),
            created_total: AtomicU64::new(0),
        }
    }

    fn map(&self, kind: TransportKind) -> &DashMap<SessionId, Arc<Session>> {
        match kind {
            TransportKind::Multiplexed => &self.multiplexed,
            TransportKind::Legacy => &self.legacy,
        }
    }

    /// Reuse the session named by `requested`, or create a new one.
    ///
    /// An id that is unknown for `kind` is not an error here: it is logged
    /// and a fresh session with a newly generated id takes its place.
    /// `make_transport` runs only when a session is created.
    pub fn resolve<F>(&self, requested: Option<&SessionId>, kind: TransportKind, make_transport: F) -> Resolved
    where
        F: FnOnce(&SessionId) -> Arc<dyn SessionTransport>,
    {
        if let Some(id) = requested {
            if let Some(session) = self.get(id, kind) {
                tracing::debug!(session_id = %id, transport = %kind, "reusing session");
                return Resolved {
                    session,
                    created: false,
                };
            }
            tracing::warn!(session_id = %id, transport = %kind, "unknown session id, creating new session");
        }

        let session = self.create(kind, make_transport);
        Resolved {
            session,
            created: true,
        }
    }

    fn create<F>(&self, kind: TransportKind, make_transport: F) -> Arc<Session>
    where
        F: FnOnce(&SessionId) -> Arc<dyn SessionTransport>,
    {
        let map = self.map(kind);
        let slot = loop {
            if let Entry::Vacant(slot) = map.entry(SessionId::new()) {
                break slot;
            }
        };

        // The shard stays locked until insert; the factory must not touch
        // the registry.
        let id = slot.key().clone();
        let session = Arc::new(Session::new(id.clone(), kind, make_transport(&id)));
        slot.insert(Arc::clone(&session));
        self.created_total.fetch_add(1, Ordering::Relaxed);
        tracing::info!(session_id = %id, transport = %kind, "session created");
        session
    }

    /// Strict lookup: open sessions only.
    pub fn get(&self, id: &SessionId, kind: TransportKind) -> Option<Arc<Session>> {
        self.map(kind)
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|session| session.is_open())
    }

    /// Remove a session and mark it closed. Removing an absent id is a no-op.
    pub fn remove(&self, id: &SessionId, kind: TransportKind) -> Option<Arc<Session>> {
        let (_, session) = self.map(kind).remove(id)?;
        session.mark_closed();
        tracing::info!(session_id = %id, transport = %kind, "session removed");
        Some(session)
    }

    /// Close every session in both namespaces, one at a time.
    ///
    /// Each session is removed whether or not its transport closed cleanly;
    /// failures are collected rather than aborting the sweep.
    pub async fn close_all(&self) -> Vec<SessionCloseError> {
        let mut errors = Vec::new();
        for kind in TransportKind::ALL {
            let snapshot: Vec<Arc<Session>> =
                self.map(kind).iter().map(|e| Arc::clone(e.value())).collect();

            for session in snapshot {
                session.begin_close();
                tracing::debug!(session_id = %session.id(), transport = %kind, "closing session");
                if let Err(source) = session.transport().close().await {
                    tracing::warn!(session_id = %session.id(), transport = %kind, error = %source, "session close failed");
                    errors.push(SessionCloseError {
                        session_id: session.id().clone(),
                        kind,
                        source,
                    });
                }
                self.remove(session.id(), kind);
            }
        }
        errors
    }

    pub fn counts(&self) -> SessionCounts {
        SessionCounts {
            multiplexed: self.multiplexed.len(),
            legacy: self.legacy.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.multiplexed.len() + self.legacy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sessions created since startup.
    pub fn created_total(&self) -> u64 {
        self.created_total.load(Ordering::Relaxed)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
