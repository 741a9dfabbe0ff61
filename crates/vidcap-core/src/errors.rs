use crate::credential::CredentialFormatError;
use crate::ids::SessionId;
use crate::transport::TransportKind;

/// Errors raised while routing an inbound request to a session.
/// Surfaced to the immediate caller; the registry never retries them.
#[derive(Clone, Debug, thiserror::Error)]
pub enum GatewayError {
    /// Resumption, termination, or legacy-message request for an id the
    /// registry does not hold.
    #[error("unknown {kind} session: {id}")]
    UnknownSession { id: SessionId, kind: TransportKind },
    /// A strict endpoint was called without any session id.
    #[error("missing {0} session id")]
    MissingSessionId(TransportKind),
    /// A connection arrived before the MCP server instance was installed.
    #[error("MCP server not initialized")]
    UninitializedServer,
    #[error(transparent)]
    CredentialFormat(#[from] CredentialFormatError),
}

impl GatewayError {
    /// HTTP status used when the error is returned to a network peer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnknownSession { kind: TransportKind::Legacy, .. } => 404,
            Self::UnknownSession { .. } | Self::MissingSessionId(_) => 400,
            Self::CredentialFormat(_) => 400,
            Self::UninitializedServer => 500,
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::UnknownSession { .. } => "unknown_session",
            Self::MissingSessionId(_) => "missing_session_id",
            Self::UninitializedServer => "uninitialized_server",
            Self::CredentialFormat(_) => "credential_format",
        }
    }
}

/// Failure of a transport handle (send or close).
#[derive(Clone, Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("transport I/O error: {0}")]
    Io(String),
}

/// A session that could not close cleanly during shutdown. Logged, never
/// escalated.
#[derive(Clone, Debug, thiserror::Error)]
#[error("failed to close {kind} session {session_id}: {source}")]
pub struct SessionCloseError {
    pub session_id: SessionId,
    pub kind: TransportKind,
    #[source]
    pub source: TransportError,
}

/// Unrecoverable errors at process start. The binary exits with status 1.
#[derive(Debug, thiserror::Error)]
pub enum FatalStartupError {
    #[error("unrecognized transport mode: {0}")]
    UnknownTransportMode(String),
    #[error("failed to attach stdio transport: {0}")]
    StdioAttach(String),
    #[error("failed to build downstream client: {0}")]
    Client(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
