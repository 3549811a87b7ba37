//! Catalog requests and status polling for the DDS bulk retrieval engine.
//!
//! This crate provides the item-retrieval half of the pipeline:
//!
//! - [`RequestExecutor`] - Authenticated GET with jittered exponential backoff
//! - [`Identity`] - Seam to the credential collaborator ([`BearerIdentity`])
//! - [`StatusPoller`] - Serial, rate-limited item polling into [`ItemBuckets`]
//! - [`url`] - Item URL construction and download URL inspection
//!
//! [`ItemBuckets`]: dds_types::ItemBuckets

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod identity;
mod poller;
pub mod url;

pub use client::{
    ClientConfig, DEFAULT_CATALOG, DEFAULT_DOMAIN, Environment, FetchError, RequestExecutor,
    RetryPolicy, jittered, retry_after,
};
pub use identity::{BearerIdentity, Identity};
pub use poller::{StatusPoller, Throttle, format_eta};
