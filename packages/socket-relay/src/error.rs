//! Relay error types

use thiserror::Error;

/// Failure to hand a frame to the underlying transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection (or the whole transport) has gone away
    #[error("connection closed")]
    Closed,

    /// No connection is registered under this id
    #[error("unknown connection: {0}")]
    UnknownConnection(String),
}

/// Errors surfaced by relay operations and handlers
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Raised by application handlers
    #[error("handler error: {0}")]
    Handler(String),
}

impl RelayError {
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }
}

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;
