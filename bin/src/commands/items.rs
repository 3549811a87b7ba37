//! Items command implementation.

use anyhow::{Context, Result};
use dds_lib::prelude::*;

use crate::PollArgs;
use crate::display::print_buckets;
use crate::targets;

/// Polls the given items and prints the bucket counts.
pub(crate) async fn items(poll: &PollArgs, quiet: bool) -> Result<()> {
    let targets = targets::load(poll)?;
    let options = DownloadOptions::default().with_progress(!quiet);
    let client = targets::client(poll, options)?;

    let buckets = client
        .poll_results(&targets.results)
        .await
        .context("Polling aborted")?;

    print_buckets(&buckets, poll.json)
}
