//! Composition of poller, downloader and shadow store.

use dds_download::{DownloadError, DownloadLayout, DownloadOptions, DownloadReport, Downloader};
use dds_fetch::url::file_name_from_url;
use dds_fetch::{ClientConfig, FetchError, Identity, StatusPoller};
use dds_shadow::{QueryContext, ShadowStore, WriteOutcome};
use dds_types::{DownloadResult, ItemBuckets, ItemRequest, ItemSource, ProductMeta};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Instrument, Span, debug, info_span, warn};

/// Extra metadata per archive id, usually the original search records.
pub type MetaByArchive = HashMap<String, Map<String, Value>>;

/// Polls, downloads and optionally mirrors lifecycle events to a shadow store.
///
/// All components log under one `dds_session` span.
#[derive(Debug, Clone)]
pub struct DdsClient {
    poller: StatusPoller,
    downloader: Downloader,
    shadow: ShadowStore,
    span: Span,
}

impl DdsClient {
    /// Creates a client without a shadow store.
    ///
    /// # Errors
    ///
    /// Returns an error if the download HTTP client cannot be created.
    pub fn new(
        identity: Arc<dyn Identity>,
        config: &ClientConfig,
        options: DownloadOptions,
    ) -> Result<Self, DownloadError> {
        let span = info_span!("dds_session", catalog = %config.catalog);
        let poller = StatusPoller::new(identity, config)
            .with_progress(options.show_progress)
            .with_span(span.clone());
        let downloader = Downloader::new(options)?.with_span(span.clone());
        Ok(Self {
            poller,
            downloader,
            shadow: ShadowStore::disabled(),
            span,
        })
    }

    /// Attaches a shadow store.
    #[must_use]
    pub fn with_shadow(mut self, shadow: ShadowStore) -> Self {
        self.shadow = shadow;
        self
    }

    /// Limits item polling to `rate` requests per second.
    #[must_use]
    pub fn with_rate_limit(mut self, rate: f64) -> Self {
        self.poller = self.poller.with_rate_limit(rate);
        self
    }

    /// Returns the status poller.
    #[must_use]
    pub const fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    /// Returns the downloader.
    #[must_use]
    pub const fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    /// Returns the shadow store (possibly disabled).
    #[must_use]
    pub const fn shadow(&self) -> &ShadowStore {
        &self.shadow
    }

    /// Polls explicit collection/archive pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if a transport failure aborts the batch.
    pub async fn poll(&self, requests: &[ItemRequest]) -> Result<ItemBuckets, FetchError> {
        self.poller.poll(requests).await
    }

    /// Polls items derived from query results.
    ///
    /// # Errors
    ///
    /// Returns an error if a transport failure aborts the batch.
    pub async fn poll_results<S: ItemSource>(
        &self,
        results: &[S],
    ) -> Result<ItemBuckets, FetchError> {
        self.poller.poll_results(results).await
    }

    /// Records the query in the shadow store, then polls its results.
    ///
    /// The query id is `None` when the store is disabled or the insert fails.
    ///
    /// # Errors
    ///
    /// Returns an error if a transport failure aborts the batch.
    pub async fn record_query_and_poll<S: ItemSource>(
        &self,
        results: &[S],
        query: &QueryContext,
    ) -> Result<(Option<i64>, ItemBuckets), FetchError> {
        let query_id = self.shadow.record_query(query).await;
        debug!(parent: &self.span, ?query_id, items = results.len(), "Recorded query");
        let buckets = self.poller.poll_results(results).await?;
        Ok((query_id, buckets))
    }

    /// Downloads the ready bucket and returns the successful results.
    ///
    /// # Errors
    ///
    /// Returns an error only if the output directories cannot be created.
    pub async fn download(
        &self,
        buckets: &ItemBuckets,
        out_dir: &Path,
        meta_by_archive: &MetaByArchive,
        query_id: Option<i64>,
    ) -> Result<Vec<DownloadResult>, DownloadError> {
        let report = self
            .download_report(buckets, out_dir, meta_by_archive, query_id)
            .await?;
        Ok(report.completed)
    }

    /// Downloads the ready bucket and reports successes and failures.
    ///
    /// Every ready item with an archive id and URL is marked `in_progress`
    /// before any download starts. Afterwards, results are marked `completed`
    /// and the remaining pre-marked items `failed`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the output directories cannot be created.
    pub async fn download_report(
        &self,
        buckets: &ItemBuckets,
        out_dir: &Path,
        meta_by_archive: &MetaByArchive,
        query_id: Option<i64>,
    ) -> Result<DownloadReport, DownloadError> {
        let tasks = Downloader::tasks_for(&buckets.ready);
        if !self.shadow.is_enabled() {
            return self.downloader.download_tasks(tasks, out_dir).await;
        }

        let span = self.span.clone();
        async move {
            let mut pending = self
                .pre_mark(buckets, out_dir, meta_by_archive, query_id)
                .await;
            let report = self.downloader.download_tasks(tasks, out_dir).await?;

            for result in &report.completed {
                if let Some((meta, _)) = pending.remove(&result.archive_id) {
                    let outcome = self
                        .shadow
                        .mark_success(&result.archive_id, query_id, &result.final_path, &meta)
                        .await;
                    log_outcome(&result.archive_id, "completed", &outcome);
                }
            }

            let errors: HashMap<&str, String> = report
                .failed
                .iter()
                .map(|f| (f.task.archive_id.as_str(), f.error.to_string()))
                .collect();
            for (product_id, (meta, path)) in pending {
                let error = errors
                    .get(product_id.as_str())
                    .map_or("download did not complete", String::as_str);
                let outcome = self
                    .shadow
                    .mark_failed(&product_id, query_id, &path, &meta, error)
                    .await;
                log_outcome(&product_id, "failed", &outcome);
            }

            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn pre_mark(
        &self,
        buckets: &ItemBuckets,
        out_dir: &Path,
        meta_by_archive: &MetaByArchive,
        query_id: Option<i64>,
    ) -> HashMap<String, (ProductMeta, PathBuf)> {
        let layout = DownloadLayout::new(out_dir);
        let empty = Map::new();
        let mut pending = HashMap::new();

        for record in &buckets.ready {
            let (Some(product_id), Some(url)) = (record.archive_id(), record.download_url()) else {
                continue;
            };
            let extra = meta_by_archive.get(product_id).unwrap_or(&empty);
            let meta = ProductMeta::from_sources(record, extra);
            let path = layout.completed_path(&file_name_from_url(url));

            let outcome = self
                .shadow
                .mark_in_progress(product_id, query_id, &meta, &path)
                .await;
            log_outcome(product_id, "in_progress", &outcome);
            pending.insert(product_id.to_string(), (meta, path));
        }

        pending
    }
}

fn log_outcome(product_id: &str, stage: &str, outcome: &WriteOutcome) {
    match outcome {
        WriteOutcome::Written => debug!(product_id, stage, "Shadow updated"),
        WriteOutcome::Skipped => {}
        WriteOutcome::Failed(error) => warn!(product_id, stage, %error, "Shadow write failed"),
    }
}
