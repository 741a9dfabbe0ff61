use serde::{Deserialize, Serialize};

/// The two session-bearing transport families. Each kind has its own
/// id namespace; an id valid for one says nothing about the other.
///
/// The direct-pipe (stdio) transport has no sessions and therefore no kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Streamable HTTP: one endpoint, many sessions tagged by header.
    Multiplexed,
    /// SSE push channel plus a separate message endpoint.
    Legacy,
}

impl TransportKind {
    pub const ALL: [TransportKind; 2] = [TransportKind::Multiplexed, TransportKind::Legacy];
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Multiplexed => f.write_str("multiplexed"),
            Self::Legacy => f.write_str("legacy"),
        }
    }
}
