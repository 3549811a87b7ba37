//! File size and content checksum of finished downloads.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Computes the lowercase hex MD5 digest of a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn file_md5(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut context = md5::Context::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }
    Ok(format!("{:x}", context.compute()))
}

/// Converts a byte count to megabytes (MiB).
#[must_use]
pub fn size_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Size in MB and checksum of `path`; both `None` if it is missing.
pub(crate) async fn file_stats(path: &Path) -> Result<(Option<f64>, Option<String>), tokio::task::JoinError> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let Ok(meta) = std::fs::metadata(&path) else {
            return (None, None);
        };
        (Some(size_mb(meta.len())), file_md5(&path).ok())
    })
    .await
}
