use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Longest id accepted from a client, prefix included.
pub const MAX_ID_LEN: usize = 128;

/// A client-supplied id that cannot name anything this server issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed {kind} id")]
pub struct InvalidId {
    pub kind: &'static str,
}

/// Server-issued ids: `<prefix>_<uuid v7>`, so they sort by creation time.
/// Ids coming back from clients go through `parse`, which keeps oversized
/// or foreign values out of lookups and logs.
macro_rules! issued_id {
    ($name:ident, $prefix:literal, $kind:literal) => {
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(format!(concat!($prefix, "_{}"), Uuid::now_v7()))
            }

            /// Accept `raw` if it carries this id's prefix and stays within
            /// [`MAX_ID_LEN`] visible ASCII characters.
            pub fn parse(raw: &str) -> Result<Self, InvalidId> {
                let well_formed = raw.len() <= MAX_ID_LEN
                    && raw
                        .strip_prefix(concat!($prefix, "_"))
                        .is_some_and(|rest| !rest.is_empty())
                    && raw.bytes().all(|b| b.is_ascii_graphic());
                if well_formed {
                    Ok(Self(raw.to_owned()))
                } else {
                    Err(InvalidId { kind: $kind })
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = InvalidId;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

issued_id!(SessionId, "sess", "session");
issued_id!(EventId, "evt", "event");
