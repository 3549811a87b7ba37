//! Zip archive expansion.

use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::DownloadError;

/// Returns true if the path names a zip archive.
#[must_use]
pub fn is_zip(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// Directory an archive expands into: a sibling named after its stem.
#[must_use]
pub fn extraction_dir(archive: &Path) -> PathBuf {
    archive.with_extension("")
}

/// Expands `archive` into its sibling stem directory.
///
/// The archive is removed afterwards unless `keep_archive` is set; failing to
/// remove it is logged, not returned.
///
/// # Errors
///
/// Returns an error if the archive cannot be read or written out.
pub async fn expand_archive(archive: &Path, keep_archive: bool) -> Result<PathBuf, DownloadError> {
    let dir = extraction_dir(archive);
    let (src, dest) = (archive.to_path_buf(), dir.clone());

    // Decompression is CPU-bound; keep it off the async workers.
    tokio::task::spawn_blocking(move || extract_zip(&src, &dest)).await??;

    if !keep_archive {
        if let Err(e) = tokio::fs::remove_file(archive).await {
            warn!(archive = %archive.display(), error = %e, "Failed to remove archive after extraction");
        }
    }

    Ok(dir)
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<(), DownloadError> {
    debug!(archive = %archive.display(), dest = %dest.display(), "Extracting archive");
    std::fs::create_dir_all(dest)?;
    let mut zip = zip::ZipArchive::new(File::open(archive)?)?;
    zip.extract(dest)?;
    debug!(entries = zip.len(), "Extracted archive");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_zip(path: &Path) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file("scene/manifest.safe", options).unwrap();
        writer.write_all(b"<manifest/>").unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_is_zip() {
        assert!(is_zip(Path::new("a/b/RCM.zip")));
        assert!(is_zip(Path::new("RCM.ZIP")));
        assert!(!is_zip(Path::new("RCM.tif")));
        assert!(!is_zip(Path::new("zip")));
    }

    #[test]
    fn test_extraction_dir_uses_stem() {
        assert_eq!(
            extraction_dir(Path::new("/out/completed/RCM1_2024.SLC.zip")),
            PathBuf::from("/out/completed/RCM1_2024.SLC")
        );
    }

    #[tokio::test]
    async fn test_expand_keeps_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("product.zip");
        write_zip(&archive);

        let dir = expand_archive(&archive, true).await.unwrap();
        assert_eq!(dir, temp.path().join("product"));
        assert_eq!(
            std::fs::read(dir.join("scene/manifest.safe")).unwrap(),
            b"<manifest/>"
        );
        assert!(archive.exists());
    }

    #[tokio::test]
    async fn test_expand_removes_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("product.zip");
        write_zip(&archive);

        let dir = expand_archive(&archive, false).await.unwrap();
        assert!(dir.join("scene/manifest.safe").exists());
        assert!(!archive.exists());
    }

    #[tokio::test]
    async fn test_expand_corrupt_archive_fails() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.zip");
        std::fs::write(&archive, b"definitely not a zip").unwrap();

        let result = expand_archive(&archive, false).await;
        assert!(matches!(result, Err(DownloadError::Extract(_))));
        assert!(archive.exists());
    }
}
