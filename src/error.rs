//! Error types for dockwire-client.

use std::time::Duration;

use thiserror::Error;

/// Main error type for all engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// Request could not be built (bad URI or header value).
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] hyper::http::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel closed before a complete header or payload was read.
    #[error("Stream truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Protocol error (oversized payload, bad stream tag, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Request options rejected before contacting the engine.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Engine host string could not be parsed.
    #[error("Invalid engine host: {0}")]
    InvalidHost(String),

    /// Connecting to the engine took too long.
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    /// The engine has no container with this id or name.
    #[error("Container not found: {id}")]
    ContainerNotFound { id: String },

    /// The engine answered with a non-success status.
    #[error("Engine returned {status}: {message}")]
    Api { status: u16, message: String },
}

impl EngineError {
    /// Whether this error means the session lost bytes mid-chunk.
    pub fn is_truncation(&self) -> bool {
        matches!(self, EngineError::Truncated { .. })
    }
}

/// Result type alias using EngineError.
pub type Result<T> = std::result::Result<T, EngineError>;
