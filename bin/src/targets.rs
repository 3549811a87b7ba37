//! Resolving command-line input into query results.

use anyhow::{Context, Result, bail};
use dds_lib::prelude::*;
use dds_lib::{MetaByArchive, load_query_results, resolve_ids};
use std::sync::Arc;

use crate::PollArgs;

/// Items to poll plus the metadata their search results carried.
pub(crate) struct Targets {
    pub(crate) results: Vec<QueryResult>,
    pub(crate) meta: MetaByArchive,
}

/// Collects targets from positional `COLLECTION:ARCHIVE` items and `--input`.
pub(crate) fn load(poll: &PollArgs) -> Result<Targets> {
    let mut results = Vec::new();
    for raw in &poll.items {
        let request: ItemRequest = raw
            .parse()
            .with_context(|| format!("Invalid item: {raw}"))?;
        results.push(QueryResult::from(&request));
    }
    if let Some(path) = &poll.input {
        let loaded = load_query_results(path)
            .with_context(|| format!("Failed to read search results from {}", path.display()))?;
        results.extend(loaded);
    }
    if results.is_empty() {
        bail!("No items given: pass COLLECTION:ARCHIVE arguments or --input FILE");
    }

    let meta = results
        .iter()
        .filter_map(|r| resolve_ids(r).map(|req| (req.archive_id, r.query_data.clone())))
        .collect();
    Ok(Targets { results, meta })
}

/// Builds a client from the polling flags.
pub(crate) fn client(poll: &PollArgs, options: DownloadOptions) -> Result<DdsClient> {
    let token = poll
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .context("No access token: pass --token or set DDS_TOKEN")?;
    let environment = if poll.staging {
        Environment::Staging
    } else {
        Environment::Prod
    };
    let config = ClientConfig::for_environment(environment);
    let identity =
        BearerIdentity::from_config(&config, token).context("Failed to create HTTP client")?;
    let client = DdsClient::new(Arc::new(identity), &config, options)
        .context("Failed to create download client")?;
    Ok(client.with_rate_limit(poll.rate_limit))
}
