//! Error types for ShelfDB

use crate::schema::ValidationError;
use thiserror::Error;

/// Result type alias for ShelfDB operations
pub type Result<T> = std::result::Result<T, ShelfError>;

/// ShelfDB error types
#[derive(Error, Debug)]
pub enum ShelfError {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload rejected by the validator
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Persisted document or index content is malformed
    #[error("Decode error: {0}")]
    Decode(String),

    /// Collection, database or field name is not usable on disk
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Expected version did not match the stored one
    #[error("Version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    /// Document, collection or database not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShelfError {
    /// Check if the caller can retry after refreshing its view
    pub fn is_retryable(&self) -> bool {
        matches!(self, ShelfError::Io(_) | ShelfError::VersionConflict { .. })
    }

    /// Check if error indicates corruption
    pub fn is_corruption(&self) -> bool {
        matches!(self, ShelfError::Decode(_))
    }
}

impl From<serde_json::Error> for ShelfError {
    fn from(e: serde_json::Error) -> Self {
        ShelfError::Decode(e.to_string())
    }
}
