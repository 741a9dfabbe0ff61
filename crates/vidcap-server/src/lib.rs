//! MCP server for the VidCap API: JSON-RPC dispatch, session registry,
//! HTTP/SSE/stdio transports, settings, and process lifecycle.

pub mod config;
pub mod event_store;
pub mod gateway;
pub mod lifecycle;
pub mod mcp;
pub mod middleware;
pub mod rpc;
pub mod session;
pub mod shutdown;
pub mod transport;

pub use config::{load_settings, Settings, SettingsError};
pub use gateway::{Gateway, GatewayConfig, SESSION_HEADER};
pub use lifecycle::{Lifecycle, TransportMode};
pub use mcp::{McpServer, ServerInfo};
pub use session::{Session, SessionRegistry, SessionTransport};
pub use shutdown::ShutdownReport;
