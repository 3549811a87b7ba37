//! Resilient bulk retrieval of EODMS DDS catalog items.
//!
//! This is a facade crate that re-exports the workspace crates and adds
//! [`DdsClient`], which wires the status poller, the downloader and the
//! optional shadow store together.

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;

pub use client::{DdsClient, MetaByArchive};

// Re-export core types
pub use dds_types::*;

// Re-export catalog requests and polling
pub use dds_fetch::{
    BearerIdentity, ClientConfig, Environment, FetchError, Identity, RequestExecutor,
    RetryPolicy, StatusPoller, Throttle, format_eta, url,
};

// Re-export downloads
pub use dds_download::{
    DownloadError, DownloadLayout, DownloadOptions, DownloadReport, Downloader, TaskFailure,
};

// Re-export the shadow store
pub use dds_shadow::{DownloadStatus, QueryContext, ShadowStore, WriteOutcome};

/// Prelude module for convenient imports.
///
/// ```
/// use dds_lib::prelude::*;
/// ```
pub mod prelude {
    pub use dds_types::{
        DdsError, DownloadResult, DownloadTask, ItemBuckets, ItemRecord, ItemRequest, ItemSource,
        ItemStatus, ProductMeta, QueryResult,
    };

    pub use dds_fetch::{BearerIdentity, ClientConfig, Environment, Identity, StatusPoller};

    pub use dds_download::{DownloadOptions, Downloader};

    pub use dds_shadow::{QueryContext, ShadowStore};

    pub use crate::DdsClient;
}
