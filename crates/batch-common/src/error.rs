//! Error types shared across the batch worker

use thiserror::Error;

/// Result type alias for batch operations
pub type Result<T> = std::result::Result<T, BatchError>;

/// Ambient error type for the batch worker
///
/// Per-message processing failures have their own taxonomy in the worker
/// crate; this type covers startup and infrastructure failures.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BatchError {
    /// Missing or empty required environment variable
    pub fn missing_var(name: &str) -> Self {
        BatchError::Config(format!("required environment variable {} is not set", name))
    }

    /// Environment variable present but not parseable
    pub fn invalid_var(name: &str, value: &str, reason: impl std::fmt::Display) -> Self {
        BatchError::Config(format!("invalid value {:?} for {}: {}", value, name, reason))
    }
}
