//! Sequential, rate-limited status polling.
//!
//! Items are fetched one at a time, with an optional minimum interval between
//! request starts.

use dds_types::{ItemBuckets, ItemRecord, ItemRequest, ItemSource, ItemStatus, resolve_ids};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Instrument, Span, debug, error, warn};

use crate::url::item_url;
use crate::{ClientConfig, FetchError, Identity, RequestExecutor};

/// Enforces a minimum interval between consecutive request starts.
#[derive(Debug, Clone)]
pub struct Throttle {
    min_interval: Option<Duration>,
    last: Option<Instant>,
}

impl Throttle {
    /// Creates a throttle allowing `rate` requests per second; `0` disables it.
    #[must_use]
    pub fn per_second(rate: f64) -> Self {
        let min_interval = (rate > 0.0 && rate.is_finite())
            .then(|| Duration::try_from_secs_f64(1.0 / rate).ok())
            .flatten();
        Self {
            min_interval,
            last: None,
        }
    }

    /// Returns the configured minimum interval.
    #[must_use]
    pub const fn min_interval(&self) -> Option<Duration> {
        self.min_interval
    }

    /// Time still to wait at `now` before the next request may start.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let interval = self.min_interval?;
        let last = self.last?;
        (last + interval)
            .checked_duration_since(now)
            .filter(|d| !d.is_zero())
    }

    /// Sleeps until the next request may start.
    pub async fn wait(&self) {
        if let Some(delay) = self.remaining(Instant::now()) {
            tokio::time::sleep(delay).await;
        }
    }

    /// Records the completion of a request.
    pub fn mark(&mut self) {
        self.last = Some(Instant::now());
    }
}

/// Running average of per-item wall time.
#[derive(Debug)]
struct Eta {
    total: usize,
    done: usize,
    elapsed: Duration,
}

impl Eta {
    const fn new(total: usize) -> Self {
        Self {
            total,
            done: 0,
            elapsed: Duration::ZERO,
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.elapsed += elapsed;
        self.done += 1;
    }

    fn remaining(&self) -> Duration {
        let done = u32::try_from(self.done.max(1)).unwrap_or(u32::MAX);
        let left = u32::try_from(self.total.saturating_sub(self.done)).unwrap_or(u32::MAX);
        (self.elapsed / done).saturating_mul(left)
    }
}

/// Formats a duration as `H:MM:SS`.
#[must_use]
pub fn format_eta(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    format!(
        "{}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60
    )
}

/// Error body returned by the catalog for failed item requests.
#[derive(Debug, Deserialize)]
struct CatalogError {
    error: Option<Value>,
    message: Option<Value>,
}

/// Fetches item status records and sorts them into buckets.
#[derive(Debug, Clone)]
pub struct StatusPoller {
    executor: RequestExecutor,
    domain: String,
    catalog: String,
    rate_limit_per_sec: f64,
    show_progress: bool,
    span: Span,
}

impl StatusPoller {
    /// Creates a poller using the given identity and configuration.
    #[must_use]
    pub fn new(identity: Arc<dyn Identity>, config: &ClientConfig) -> Self {
        Self {
            executor: RequestExecutor::new(identity, config.retry),
            domain: config.domain.clone(),
            catalog: config.catalog.clone(),
            rate_limit_per_sec: 0.0,
            show_progress: false,
            span: Span::none(),
        }
    }

    /// Limits polling to `rate` requests per second (`0` means unlimited).
    #[must_use]
    pub const fn with_rate_limit(mut self, rate: f64) -> Self {
        self.rate_limit_per_sec = rate;
        self
    }

    /// Shows a progress bar with bucket counts and ETA while polling.
    #[must_use]
    pub const fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Overrides the catalog name used in item URLs.
    #[must_use]
    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = catalog.into();
        self
    }

    /// Attaches the span all polling work is recorded under.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Returns the underlying request executor.
    #[must_use]
    pub const fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Fetches one item record.
    ///
    /// Returns `Ok(None)` when the catalog answers with anything but 200/202
    /// after retries, or when the body is not a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error for transport or credential failures.
    pub async fn get_item(
        &self,
        collection_id: &str,
        archive_id: &str,
    ) -> Result<Option<ItemRecord>, FetchError> {
        let url = item_url(&self.domain, &self.catalog, collection_id, archive_id);
        let token = self.executor.identity().access_token().await?;
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );

        let response = self.executor.execute(&url, &headers).await?;
        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!(%url, error = %e, "Failed to read item response body");
                return Ok(None);
            }
        };

        if status == StatusCode::OK || status == StatusCode::ACCEPTED {
            return match serde_json::from_slice::<Map<String, Value>>(&body) {
                Ok(attributes) => Ok(Some(ItemRecord::new(attributes))),
                Err(e) => {
                    warn!(%url, error = %e, "Item response is not a JSON object");
                    Ok(None)
                }
            };
        }

        match serde_json::from_slice::<CatalogError>(&body) {
            Ok(err) => error!(
                status = status.as_u16(),
                error = ?err.error,
                message = ?err.message,
                "Failed to get item"
            ),
            Err(_) => error!(status = status.as_u16(), "Failed to get item (non-JSON error)"),
        }
        Ok(None)
    }

    /// Polls items given as explicit collection/archive pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if a transport failure escapes the retry loop; the
    /// batch is abandoned at that point.
    pub async fn poll(&self, requests: &[ItemRequest]) -> Result<ItemBuckets, FetchError> {
        let entries = requests
            .iter()
            .map(|r| (r.to_string(), Some(r.clone())))
            .collect();
        self.poll_entries(entries)
            .instrument(self.span.clone())
            .await
    }

    /// Polls items derived from query results.
    ///
    /// Results whose identifiers cannot be resolved are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if a transport failure escapes the retry loop.
    pub async fn poll_results<S: ItemSource>(
        &self,
        results: &[S],
    ) -> Result<ItemBuckets, FetchError> {
        let entries = results
            .iter()
            .map(|r| {
                let label = r.identifier().unwrap_or("NO-UUID").to_string();
                (label, resolve_ids(r))
            })
            .collect();
        self.poll_entries(entries)
            .instrument(self.span.clone())
            .await
    }

    async fn poll_entries(
        &self,
        entries: Vec<(String, Option<ItemRequest>)>,
    ) -> Result<ItemBuckets, FetchError> {
        let mut buckets = ItemBuckets::new();
        let mut throttle = Throttle::per_second(self.rate_limit_per_sec);
        let mut eta = Eta::new(entries.len());
        let progress = self.progress_bar(entries.len() as u64);

        for (label, request) in entries {
            throttle.wait().await;

            let started = Instant::now();
            let outcome = self.poll_one(&label, request, &mut buckets).await;
            eta.record(started.elapsed());
            throttle.mark();

            let remaining = eta.remaining();
            progress.set_message(format!(
                "ready={} queued={} unknown={} eta={}",
                buckets.ready.len(),
                buckets.queued.len(),
                buckets.unknown.len(),
                format_eta(remaining)
            ));
            progress.inc(1);
            debug!(
                item = %label,
                ready = buckets.ready.len(),
                queued = buckets.queued.len(),
                unknown = buckets.unknown.len(),
                eta_secs = remaining.as_secs(),
                "Polled item"
            );

            if let Err(e) = outcome {
                progress.abandon();
                return Err(e);
            }
        }

        progress.finish();
        Ok(buckets)
    }

    async fn poll_one(
        &self,
        label: &str,
        request: Option<ItemRequest>,
        buckets: &mut ItemBuckets,
    ) -> Result<Option<ItemStatus>, FetchError> {
        let Some(request) = request else {
            warn!(item = %label, "Skipping item (missing collectionId/archiveId)");
            return Ok(None);
        };

        match self
            .get_item(&request.collection_id, &request.archive_id)
            .await?
        {
            Some(record) => Ok(Some(buckets.push(record))),
            None => {
                warn!(item = %request, "Skipping item (fetch failure)");
                Ok(None)
            }
        }
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} DDS get_items [{bar:30.cyan/blue}] {pos}/{len} items {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb
    }
}
