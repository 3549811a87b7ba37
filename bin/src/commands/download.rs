//! Download command implementation.
//!
//! Polls the catalog, downloads every ready item and, when a database is
//! given, records the query and each download transition in it.

use anyhow::{Context, Result};
use dds_lib::prelude::*;
use std::path::PathBuf;

use crate::PollArgs;
use crate::display::{dispositions, print_dispositions};
use crate::targets;

/// Download-specific flags.
pub(crate) struct DownloadArgs {
    pub(crate) out: PathBuf,
    pub(crate) unzip: bool,
    pub(crate) keep_zip: bool,
    pub(crate) workers: usize,
    pub(crate) db: Option<PathBuf>,
    pub(crate) query: Option<PathBuf>,
}

/// Polls the given items and downloads the ready ones.
pub(crate) async fn download(poll: &PollArgs, args: DownloadArgs, quiet: bool) -> Result<()> {
    let targets = targets::load(poll)?;
    let query = match &args.query {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<QueryContext>(&text)
                .with_context(|| format!("Invalid query description in {}", path.display()))?
        }
        None => QueryContext::default(),
    };

    let options = DownloadOptions::default()
        .with_unzip(args.unzip)
        .with_keep_zip(args.keep_zip)
        .with_max_workers(args.workers)
        .with_progress(!quiet);
    let shadow = ShadowStore::open(args.db.as_deref()).await;
    if args.db.is_some() && !shadow.is_enabled() {
        tracing::warn!("Database not usable, downloads will not be recorded");
    }
    let client = targets::client(poll, options)?.with_shadow(shadow);

    let (query_id, buckets) = client
        .record_query_and_poll(&targets.results, &query)
        .await
        .context("Polling aborted")?;

    let report = client
        .download_report(&buckets, &args.out, &targets.meta, query_id)
        .await
        .with_context(|| format!("Failed to prepare {}", args.out.display()))?;

    print_dispositions(&dispositions(&buckets, &report), poll.json)
}
