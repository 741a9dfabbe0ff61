pub mod legacy;
pub mod stdio;
pub mod streamable;

pub use legacy::{LegacyEvent, LegacySseTransport, RemoveOnDrop};
pub use stdio::serve_stdio;
pub use streamable::StreamableTransport;
