#![recursion_limit = "256"]
pub mod registry;
pub mod tools;

pub use registry::{ToolRegistry, ToolSource};
pub use tools::create_default_registry;
