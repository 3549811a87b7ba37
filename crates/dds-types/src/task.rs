//! Download bookkeeping types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One file to download, derived from a ready item record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Source URL.
    pub url: String,
    /// Archive id of the product being downloaded.
    pub archive_id: String,
    /// File name used in both the in-progress and completed directories.
    pub file_name: String,
}

impl DownloadTask {
    /// Creates a new download task.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        archive_id: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            archive_id: archive_id.into(),
            file_name: file_name.into(),
        }
    }
}

/// Outcome of a successfully completed download task.
///
/// A task skipped because its file was already complete also yields a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    /// Archive id of the downloaded product.
    pub archive_id: String,
    /// Location of the verified file in the completed directory.
    pub final_path: PathBuf,
    /// Directory the archive was expanded into, if extraction ran.
    pub extracted_dir: Option<PathBuf>,
}
