//! Framework error types

use thiserror::Error;

/// Errors raised by session storage and configuration
#[derive(Error, Debug)]
pub enum FrameworkError {
    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A session with this key already exists
    #[error("Session already exists: {0}")]
    SessionExists(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl FrameworkError {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        FrameworkError::Other(msg.into())
    }

    /// Create a configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        FrameworkError::InvalidConfig(msg.into())
    }
}

/// Result type alias for framework operations
pub type FrameworkResult<T> = Result<T, FrameworkError>;
