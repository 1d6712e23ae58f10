//! Wire-level protocol types: JSON-RPC envelopes, MCP payloads and the
//! protocol error type.

pub mod error;
pub mod messages;
pub mod types;

pub use error::McpError;
pub use messages::*;
pub use types::*;
