//! Resumable, integrity-checked downloads for the DDS bulk retrieval engine.
//!
//! - [`Downloader`] - Bounded worker pool over ready item records
//! - [`DownloadOptions`] - Workers, retries, extraction and progress settings
//! - [`DownloadLayout`] - The `in_progress` / `completed` directory pair
//! - [`expand_archive`] - Zip expansion into a sibling directory

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod downloader;
mod error;
mod extract;
mod layout;
mod options;
mod transfer;

pub use downloader::{DownloadReport, Downloader, TaskFailure};
pub use error::DownloadError;
pub use extract::{expand_archive, extraction_dir, is_zip};
pub use layout::{COMPLETED_DIR, DownloadLayout, IN_PROGRESS_DIR, PART_SUFFIX, part_path};
pub use options::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_WORKERS, DownloadOptions};
