//! Protocol-level errors raised by the JSON-RPC client and its transports.
//!
//! These never cross a Binding boundary: the session converts them into
//! [`crate::BridgeError`] or an error-tagged [`crate::InvocationResult`].

use crate::protocol::messages::JsonRpcError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    /// JSON-RPC error object returned by the server
    #[error("MCP server error: {0}")]
    ServerError(#[from] JsonRpcError),

    /// I/O or connection failure below the protocol
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed JSON that does not follow the protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Client not initialized - call initialize() first")]
    NotInitialized,

    #[error("Failed to spawn process: {0}")]
    ProcessSpawn(String),

    #[error("MCP server process exited unexpectedly")]
    ProcessExited,

    /// The server ended the stream replies arrive on
    #[error("Connection closed by MCP server")]
    ConnectionClosed,

    #[error("Response ID mismatch: expected {expected}, got {actual}")]
    ResponseIdMismatch { expected: String, actual: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    pub fn transport(msg: impl Into<String>) -> Self {
        McpError::Transport(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        McpError::Protocol(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, McpError::Timeout(_))
    }

    /// True when the channel itself is gone and no further exchange can succeed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            McpError::ProcessExited
                | McpError::ConnectionClosed
                | McpError::Timeout(_)
                | McpError::ResponseIdMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = McpError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "Request timed out after 5s");

        let err = McpError::ResponseIdMismatch {
            expected: "1".into(),
            actual: "2".into(),
        };
        assert_eq!(err.to_string(), "Response ID mismatch: expected 1, got 2");
    }

    #[test]
    fn test_error_helpers() {
        assert!(matches!(
            McpError::transport("connection refused"),
            McpError::Transport(_)
        ));
        assert!(matches!(
            McpError::protocol("invalid version"),
            McpError::Protocol(_)
        ));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(McpError::ProcessExited.is_fatal());
        assert!(McpError::ConnectionClosed.is_fatal());
        assert!(McpError::Timeout(Duration::from_secs(1)).is_timeout());
        assert!(!McpError::transport("HTTP error 500").is_fatal());
    }
}
