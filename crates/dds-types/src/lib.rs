//! Core types for the DDS bulk retrieval engine.
//!
//! This crate provides the data structures shared by the fetch, download and
//! persistence crates:
//!
//! - [`ItemRequest`] - Collection/archive id pair identifying one catalog item
//! - [`ItemRecord`] - Raw attribute mapping returned by the catalog
//! - [`ItemStatus`] - Availability of an item (`Available`, `Queued`, other)
//! - [`ItemBuckets`] - Items partitioned by status after a polling pass
//! - [`ItemSource`] - Capability for query results that carry item identifiers
//! - [`DownloadTask`] / [`DownloadResult`] - Per-file download bookkeeping
//! - [`ProductMeta`] - Normalized product metadata for lifecycle records

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod item;
mod meta;
mod source;
mod task;

pub use error::{DdsError, Result};
pub use item::{ItemBuckets, ItemRecord, ItemRequest, ItemStatus};
pub use meta::{DEFAULT_CONSTELLATION, ProductMeta, parse_timestamp};
pub use source::{
    ARCHIVE_ID_KEYS, COLLECTION_ID_KEYS, ItemSource, QueryResult, load_query_results, resolve_ids,
};
pub use task::{DownloadResult, DownloadTask};
