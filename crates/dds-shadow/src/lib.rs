//! Optional SQLite shadow of DDS queries and download lifecycle events.
//!
//! - [`ShadowStore`] - Schema-gated, best-effort writer
//! - [`QueryContext`] - Search parameters recorded per query
//! - [`WriteOutcome`] - What happened to a single write
//! - [`file_md5`] - Checksum recorded for completed files

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod checksum;
mod error;
pub mod schema;
mod store;

pub use checksum::{file_md5, size_mb};
pub(crate) use error::ShadowError;
pub use store::{DownloadStatus, QueryContext, ShadowStore, WriteOutcome};
