//! Single-file transfer with retries and size verification.

use dds_fetch::{RetryPolicy, jittered, retry_after, url::expected_size_from_url};
use futures::StreamExt;
use indicatif::ProgressBar;
use reqwest::{Client, StatusCode};
use std::path::Path;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use crate::DownloadError;
use crate::layout::{file_len, part_path};

/// How a transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transfer {
    /// Body was written to the staging path.
    Downloaded,
    /// The completed file already matches the advertised length.
    AlreadyComplete,
}

/// Paths and settings for one transfer.
pub(crate) struct TransferTarget<'a> {
    pub(crate) url: &'a str,
    /// In-progress path the verified body is renamed to.
    pub(crate) staging: &'a Path,
    /// Completed path checked against `Content-Length` when the URL has no size.
    pub(crate) completed: &'a Path,
    pub(crate) chunk_size: usize,
}

/// Downloads `target.url` into `target.staging`, retrying any failure.
///
/// Each failed attempt removes its `.part` file. Non-success statuses honour
/// `Retry-After` on 429; everything else uses the policy's exponential delay.
pub(crate) async fn transfer_with_retries(
    client: &Client,
    target: &TransferTarget<'_>,
    policy: &RetryPolicy,
    progress: &ProgressBar,
) -> Result<Transfer, DownloadError> {
    let part = part_path(target.staging);
    let max_attempts = policy.max_retries.max(1);
    let mut attempt = 1;

    loop {
        progress.set_position(0);
        match transfer_once(client, target, &part, progress).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) => {
                if let Err(remove) = tokio::fs::remove_file(&part).await {
                    if remove.kind() != std::io::ErrorKind::NotFound {
                        warn!(part = %part.display(), error = %remove, "Failed to remove partial file");
                    }
                }

                if attempt >= max_attempts {
                    return Err(e);
                }

                let delay = match &e {
                    DownloadError::Status {
                        status,
                        retry_after,
                    } => StatusCode::from_u16(*status).map_or_else(
                        |_| policy.base_delay(attempt),
                        |status| policy.delay_for(status, *retry_after, attempt),
                    ),
                    _ => policy.base_delay(attempt),
                };
                let delay = jittered(delay);
                warn!(
                    url = target.url,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Download attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

async fn transfer_once(
    client: &Client,
    target: &TransferTarget<'_>,
    part: &Path,
    progress: &ProgressBar,
) -> Result<Transfer, DownloadError> {
    let response = client.get(target.url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            status: status.as_u16(),
            retry_after: retry_after(response.headers()),
        });
    }

    let url_size = expected_size_from_url(target.url);
    let content_length = response.content_length();

    if url_size.is_none() {
        if let Some(len) = content_length {
            if file_len(target.completed).await == Some(len) {
                debug!(path = %target.completed.display(), "Completed file matches Content-Length");
                return Ok(Transfer::AlreadyComplete);
            }
        }
    }

    let expected = url_size.or(content_length);
    if let Some(total) = expected {
        if progress.length().is_none() {
            progress.set_length(total);
        }
    }

    let file = tokio::fs::File::create(part).await?;
    let mut writer = BufWriter::with_capacity(target.chunk_size, file);
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        progress.inc(chunk.len() as u64);
    }
    writer.flush().await?;
    writer.into_inner().sync_all().await?;

    let actual = tokio::fs::metadata(part).await?.len();
    if let Some(expected) = expected {
        if actual != expected {
            return Err(DownloadError::Integrity { expected, actual });
        }
    }

    tokio::fs::rename(part, target.staging).await?;
    debug!(url = target.url, bytes = actual, "Transfer complete");
    Ok(Transfer::Downloaded)
}
