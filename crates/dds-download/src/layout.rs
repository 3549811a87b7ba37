//! On-disk layout of a download batch.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Directory receiving files while they download.
pub const IN_PROGRESS_DIR: &str = "in_progress";

/// Directory holding verified, finished files.
pub const COMPLETED_DIR: &str = "completed";

/// Suffix of the temporary file a body is streamed into.
pub const PART_SUFFIX: &str = ".part";

/// Paths of one batch: `<out>/in_progress` and `<out>/completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLayout {
    in_progress: PathBuf,
    completed: PathBuf,
}

impl DownloadLayout {
    /// Computes the layout below `out_dir` without touching the filesystem.
    #[must_use]
    pub fn new(out_dir: &Path) -> Self {
        Self {
            in_progress: out_dir.join(IN_PROGRESS_DIR),
            completed: out_dir.join(COMPLETED_DIR),
        }
    }

    /// Computes the layout and creates both directories.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub async fn create(out_dir: &Path) -> std::io::Result<Self> {
        let layout = Self::new(out_dir);
        tokio::fs::create_dir_all(&layout.in_progress).await?;
        tokio::fs::create_dir_all(&layout.completed).await?;
        Ok(layout)
    }

    /// Returns the in-progress directory.
    #[must_use]
    pub fn in_progress_dir(&self) -> &Path {
        &self.in_progress
    }

    /// Returns the completed directory.
    #[must_use]
    pub fn completed_dir(&self) -> &Path {
        &self.completed
    }

    /// Path a file occupies while downloading.
    #[must_use]
    pub fn in_progress_path(&self, file_name: &str) -> PathBuf {
        self.in_progress.join(file_name)
    }

    /// Path a file occupies once complete.
    #[must_use]
    pub fn completed_path(&self, file_name: &str) -> PathBuf {
        self.completed.join(file_name)
    }
}

/// Returns the `.part` sibling of `dest`.
#[must_use]
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

/// Size of the file at `path`, or `None` if it is absent or not a file.
pub(crate) async fn file_len(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .filter(std::fs::Metadata::is_file)
        .map(|m| m.len())
}
