//! Downloader configuration.

use dds_fetch::RetryPolicy;
use std::time::Duration;

/// Default number of concurrent download workers.
pub const DEFAULT_MAX_WORKERS: usize = 3;

/// Default write buffer size for streamed bodies (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Options controlling a download batch.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Expand `.zip` files after download.
    pub unzip: bool,
    /// Keep the archive after a successful expansion.
    pub keep_zip: bool,
    /// Number of files downloaded concurrently.
    pub max_workers: usize,
    /// Per-file retry settings.
    pub retry: RetryPolicy,
    /// Write buffer size used while streaming a body to disk.
    pub chunk_size: usize,
    /// Connect timeout and maximum idle time between body reads.
    ///
    /// A slow transfer that keeps receiving data is never cut off.
    pub timeout: Duration,
    /// Whether to draw per-file progress bars.
    pub show_progress: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            unzip: false,
            keep_zip: true,
            max_workers: DEFAULT_MAX_WORKERS,
            retry: RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(20)),
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: Duration::from_secs(60),
            show_progress: true,
        }
    }
}

impl DownloadOptions {
    /// Sets whether archives are expanded.
    #[must_use]
    pub const fn with_unzip(mut self, unzip: bool) -> Self {
        self.unzip = unzip;
        self
    }

    /// Sets whether archives are kept after expansion.
    #[must_use]
    pub const fn with_keep_zip(mut self, keep: bool) -> Self {
        self.keep_zip = keep;
        self
    }

    /// Sets the worker count. Zero is treated as one.
    #[must_use]
    pub const fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = if workers == 0 { 1 } else { workers };
        self
    }

    /// Sets the per-file retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the connect and read-idle timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets whether progress bars are drawn.
    #[must_use]
    pub const fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }
}
