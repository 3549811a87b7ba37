//! Download error types.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while downloading or finalizing a file.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// HTTP request or body stream failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned a non-success status.
    #[error("Server returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// `Retry-After` hint sent with the response.
        retry_after: Option<Duration>,
    },

    /// Downloaded size differs from the expected size.
    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    Integrity {
        /// Expected byte count.
        expected: u64,
        /// Bytes actually written.
        actual: u64,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive could not be read or expanded.
    #[error("Extraction error: {0}")]
    Extract(#[from] zip::result::ZipError),

    /// Blocking worker panicked or was cancelled.
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
