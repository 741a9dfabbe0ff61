pub mod credential;
pub mod errors;
pub mod ids;
pub mod tools;
pub mod transport;

pub use credential::{Credential, CredentialFormatError, CredentialScope};
pub use ids::{EventId, InvalidId, SessionId};
pub use transport::TransportKind;
