//! Bridge-level error taxonomy.

use thiserror::Error;

/// A tool or prompt listing entry that cannot be turned into a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid listing entry `{entry}`: {reason}")]
pub struct SchemaError {
    /// Name of the offending entry (may be empty if the name itself is missing)
    pub entry: String,
    pub reason: String,
}

impl SchemaError {
    pub fn new(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Transport could not be opened or the handshake failed
    #[error("connection failed: {0}")]
    Connection(String),

    /// Operation attempted while the session is not ready
    #[error("not connected")]
    NotConnected,

    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The server reported an error, or the transport failed mid-call
    #[error("{target} failed: {message}")]
    RemoteCall { target: String, message: String },

    /// Strict argument checking; the permissive policy never raises it
    #[error("invalid arguments: {0}")]
    Validation(String),

    /// The session worker could not be started or has stopped
    #[error("runtime unavailable: {0}")]
    Runtime(String),
}

impl BridgeError {
    pub fn remote(target: impl Into<String>, err: impl std::fmt::Display) -> Self {
        BridgeError::RemoteCall {
            target: target.into(),
            message: err.to_string(),
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
