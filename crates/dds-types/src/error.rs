//! Error types shared across the dds crates.

use thiserror::Error;

/// Result type alias for dds operations.
pub type Result<T> = std::result::Result<T, DdsError>;

/// Errors raised while building or loading item requests.
#[derive(Error, Debug)]
pub enum DdsError {
    /// Collection or archive identifier could not be resolved.
    #[error("Cannot resolve item identifiers: {0}")]
    Resolution(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
