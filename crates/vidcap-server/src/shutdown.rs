//! Graceful shutdown: stop accepting, close every session, then drain the
//! listener tasks against a deadline.
//!
//! Open SSE responses keep their connection busy until the session behind
//! them closes, so a listener cannot drain before the session sweep. A second
//! sweep after the drain catches sessions opened by requests that were
//! already in flight when the listener stopped accepting.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vidcap_core::errors::SessionCloseError;

use crate::session::SessionRegistry;

/// Outcome of a graceful shutdown.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub sessions_closed: usize,
    /// Sessions whose transport failed to close. They were still removed.
    pub close_failures: Vec<SessionCloseError>,
    /// Whether listener tasks finished before the deadline.
    pub drained: bool,
}

impl ShutdownReport {
    /// Close failures are logged, not escalated: a graceful shutdown always
    /// exits 0.
    pub fn exit_code(&self) -> i32 {
        0
    }

    async fn sweep(&mut self, registry: &SessionRegistry) {
        let open = registry.len();
        if open == 0 {
            return;
        }
        let failures = registry.close_all().await;
        if !failures.is_empty() {
            warn!(failed = failures.len(), "some sessions did not close cleanly");
        }
        self.sessions_closed += open;
        self.close_failures.extend(failures);
    }
}

/// Owns the cancellation token listener tasks stop on.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    deadline: Duration,
}

impl ShutdownCoordinator {
    pub fn new(deadline: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline,
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Shut `listeners` down and empty `registry`. Listeners still running
    /// at the deadline are aborted and the report says `drained: false`.
    pub async fn shutdown(&self, registry: &SessionRegistry, listeners: Vec<JoinHandle<()>>) -> ShutdownReport {
        self.token.cancel();

        let mut report = ShutdownReport::default();
        report.sweep(registry).await;
        report.drained = self.drain(listeners).await;
        report.sweep(registry).await;

        info!(
            sessions_closed = report.sessions_closed,
            close_failures = report.close_failures.len(),
            drained = report.drained,
            "sessions closed"
        );
        report
    }

    async fn drain(&self, listeners: Vec<JoinHandle<()>>) -> bool {
        if listeners.is_empty() {
            return true;
        }
        info!(task_count = listeners.len(), timeout_ms = self.deadline.as_millis() as u64, "draining listeners");

        let aborts: Vec<_> = listeners.iter().map(JoinHandle::abort_handle).collect();
        if tokio::time::timeout(self.deadline, futures::future::join_all(listeners))
            .await
            .is_err()
        {
            warn!(deadline = ?self.deadline, "listeners did not drain in time, aborting");
            for handle in aborts {
                handle.abort();
            }
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::FakeTransport;
    use crate::session::SessionTransport;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use vidcap_core::TransportKind;

    fn register(registry: &SessionRegistry, transport: Arc<FakeTransport>) {
        let kind = transport.kind();
        registry.resolve(None, kind, move |_| transport as Arc<dyn SessionTransport>);
    }

    #[tokio::test]
    async fn listener_held_open_by_a_session_drains_after_the_sweep() {
        let registry = SessionRegistry::new();
        let stream = Arc::new(FakeTransport::new(TransportKind::Legacy));
        register(&registry, Arc::clone(&stream));

        // Stands in for a connection serving that session's event stream.
        let held = Arc::clone(&stream);
        let listener = tokio::spawn(async move {
            while !held.closed.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let coord = ShutdownCoordinator::new(Duration::from_secs(5));
        let report = coord.shutdown(&registry, vec![listener]).await;

        assert!(report.drained);
        assert_eq!(report.sessions_closed, 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn session_opened_during_drain_is_closed_too() {
        let registry = Arc::new(SessionRegistry::new());
        register(&registry, Arc::new(FakeTransport::new(TransportKind::Multiplexed)));

        let coord = ShutdownCoordinator::new(Duration::from_secs(5));
        let token = coord.token();
        let late = Arc::new(FakeTransport::new(TransportKind::Multiplexed));
        let (in_flight, straggler) = (Arc::clone(&registry), Arc::clone(&late));
        let listener = tokio::spawn(async move {
            token.cancelled().await;
            register(&in_flight, straggler);
        });

        let report = coord.shutdown(&registry, vec![listener]).await;

        assert!(report.drained);
        assert_eq!(report.sessions_closed, 2);
        assert!(late.closed.load(Ordering::SeqCst));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn stuck_listener_is_aborted_at_the_deadline() {
        let registry = SessionRegistry::new();
        register(&registry, Arc::new(FakeTransport::failing(TransportKind::Legacy)));
        let listener = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(300)).await;
        });

        let coord = ShutdownCoordinator::new(Duration::from_millis(50));
        let report = coord.shutdown(&registry, vec![listener]).await;

        assert!(!report.drained);
        assert_eq!(report.close_failures.len(), 1);
        assert!(registry.is_empty());
        assert_eq!(report.exit_code(), 0);
    }
}
