//! MCP Transport Layer
//!
//! A transport moves whole JSON-RPC frames. It knows nothing about request
//! IDs or method names; pairing requests with responses is the client's job.

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub mod sse;
#[cfg(feature = "stdio")]
pub mod stdio;

use crate::protocol::McpError;
use async_trait::async_trait;

/// Frame channel to one MCP server
///
/// Implementations are owned exclusively by one [`crate::client::McpClient`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one serialized JSON-RPC frame
    async fn send(&mut self, message: &str) -> Result<(), McpError>;

    /// Receive the next serialized JSON-RPC frame
    async fn receive(&mut self) -> Result<String, McpError>;

    /// Release every resource held by the transport. Must be idempotent.
    async fn close(&mut self) -> Result<(), McpError>;

    fn is_connected(&self) -> bool;
}
