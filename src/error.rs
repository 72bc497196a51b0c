//! Error types for the broadcast engine.

use thiserror::Error;

/// Main error type for broadcaster operations.
///
/// Unknown subscriber ids and out-of-range log queries are not errors;
/// those calls return empty results or do nothing.
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Intake is closed")]
    IntakeClosed,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl From<serde_json::Error> for BroadcastError {
    fn from(e: serde_json::Error) -> Self {
        BroadcastError::Serialization(e.to_string())
    }
}

/// Result type for broadcaster operations.
pub type Result<T> = std::result::Result<T, BroadcastError>;
