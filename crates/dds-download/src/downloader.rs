//! Concurrent batch downloader.

use dds_fetch::url::file_name_from_url;
use dds_types::{DownloadResult, DownloadTask, ItemRecord};
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::Client;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{Instrument, Span, debug, error, info, warn};

use crate::extract::{expand_archive, is_zip};
use crate::layout::{DownloadLayout, file_len};
use crate::transfer::{Transfer, TransferTarget, transfer_with_retries};
use crate::{DownloadError, DownloadOptions};

/// A task that exhausted its attempts or failed to finalize.
#[derive(Debug)]
pub struct TaskFailure {
    /// The task that failed.
    pub task: DownloadTask,
    /// The last error observed.
    pub error: DownloadError,
}

/// Per-task outcomes of a batch.
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Tasks whose file is verified in the completed directory.
    pub completed: Vec<DownloadResult>,
    /// Tasks that failed.
    pub failed: Vec<TaskFailure>,
}

impl DownloadReport {
    /// Number of tasks attempted.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}

/// Downloads ready items into `<out>/completed`, several at a time.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    options: DownloadOptions,
    span: Span,
}

impl Downloader {
    /// Creates a downloader with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(options: DownloadOptions) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .pool_max_idle_per_host(options.max_workers)
            .tcp_nodelay(true)
            .connect_timeout(options.timeout)
            .read_timeout(options.timeout)
            .user_agent(concat!("dds-download/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, options))
    }

    /// Creates a downloader around an existing client.
    #[must_use]
    pub fn with_client(client: Client, options: DownloadOptions) -> Self {
        Self {
            client,
            options,
            span: Span::none(),
        }
    }

    /// Attaches a tracing span every batch runs inside.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Returns the downloader options.
    #[must_use]
    pub const fn options(&self) -> &DownloadOptions {
        &self.options
    }

    /// Builds one task per record that carries a download URL.
    ///
    /// Records resolving to a file name already claimed by an earlier record
    /// are dropped so that no two workers write the same path.
    #[must_use]
    pub fn tasks_for(ready: &[ItemRecord]) -> Vec<DownloadTask> {
        let mut seen = HashSet::new();
        ready
            .iter()
            .filter_map(|record| {
                let url = record.download_url()?;
                let file_name = file_name_from_url(url);
                if !seen.insert(file_name.clone()) {
                    warn!(%file_name, url, "Duplicate file name, skipping");
                    return None;
                }
                Some(DownloadTask::new(
                    url,
                    record.archive_id_or_unknown(),
                    file_name,
                ))
            })
            .collect()
    }

    /// Downloads every ready record with a URL and returns the successes.
    ///
    /// Failed files are logged and left out of the result.
    ///
    /// # Errors
    ///
    /// Returns an error only if the output directories cannot be created.
    pub async fn download_all(
        &self,
        ready: &[ItemRecord],
        out_dir: &Path,
    ) -> Result<Vec<DownloadResult>, DownloadError> {
        let report = self.download_tasks(Self::tasks_for(ready), out_dir).await?;
        Ok(report.completed)
    }

    /// Downloads the given tasks and reports each outcome.
    ///
    /// An empty task list returns an empty report without touching the disk.
    ///
    /// # Errors
    ///
    /// Returns an error only if the output directories cannot be created.
    pub async fn download_tasks(
        &self,
        tasks: Vec<DownloadTask>,
        out_dir: &Path,
    ) -> Result<DownloadReport, DownloadError> {
        if tasks.is_empty() {
            info!("No downloadable items");
            return Ok(DownloadReport::default());
        }

        let span = self.span.clone();
        self.run_batch(tasks, out_dir).instrument(span).await
    }

    async fn run_batch(
        &self,
        tasks: Vec<DownloadTask>,
        out_dir: &Path,
    ) -> Result<DownloadReport, DownloadError> {
        let layout = DownloadLayout::create(out_dir).await?;
        let multi = if self.options.show_progress {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        let total = tasks.len();
        let workers = self.options.max_workers.max(1);
        debug!(total, workers, out_dir = %out_dir.display(), "Starting download batch");

        let outcomes: Vec<(DownloadTask, Result<DownloadResult, DownloadError>)> =
            stream::iter(tasks.into_iter().enumerate())
                .map(|(index, task)| {
                    let progress = multi.add(task_progress(index, total, &task));
                    let layout = &layout;
                    async move {
                        let result = self.run_task(&task, layout, &progress).await;
                        progress.finish_and_clear();
                        (task, result)
                    }
                })
                .buffer_unordered(workers)
                .collect()
                .await;

        let mut report = DownloadReport::default();
        for (task, result) in outcomes {
            match result {
                Ok(done) => report.completed.push(done),
                Err(error) => {
                    error!(
                        archive_id = %task.archive_id,
                        url = %task.url,
                        error = %error,
                        "Download failed"
                    );
                    report.failed.push(TaskFailure { task, error });
                }
            }
        }

        info!(
            "Downloaded {}/{} items to {}",
            report.completed.len(),
            total,
            layout.completed_dir().display()
        );
        Ok(report)
    }

    async fn run_task(
        &self,
        task: &DownloadTask,
        layout: &DownloadLayout,
        progress: &ProgressBar,
    ) -> Result<DownloadResult, DownloadError> {
        let staging = layout.in_progress_path(&task.file_name);
        let final_path = layout.completed_path(&task.file_name);

        if let Some(expected) = dds_fetch::url::expected_size_from_url(&task.url) {
            if file_len(&final_path).await == Some(expected) {
                debug!(path = %final_path.display(), "Already downloaded");
                return self.finalize(task, final_path).await;
            }
        }

        let target = TransferTarget {
            url: &task.url,
            staging: &staging,
            completed: &final_path,
            chunk_size: self.options.chunk_size,
        };
        match transfer_with_retries(&self.client, &target, &self.options.retry, progress).await? {
            Transfer::Downloaded => {
                if let Err(error) = tokio::fs::rename(&staging, &final_path).await {
                    warn!(
                        staging = %staging.display(),
                        completed = %final_path.display(),
                        %error,
                        "Verified file left in the in-progress directory"
                    );
                    return Err(error.into());
                }
            }
            Transfer::AlreadyComplete => {
                debug!(path = %final_path.display(), "Already downloaded");
            }
        }

        self.finalize(task, final_path).await
    }

    async fn finalize(
        &self,
        task: &DownloadTask,
        final_path: PathBuf,
    ) -> Result<DownloadResult, DownloadError> {
        let extracted_dir = if self.options.unzip && is_zip(&final_path) {
            Some(expand_archive(&final_path, self.options.keep_zip).await?)
        } else {
            None
        };

        Ok(DownloadResult {
            archive_id: task.archive_id.clone(),
            final_path,
            extracted_dir,
        })
    }
}

fn task_progress(index: usize, total: usize, task: &DownloadTask) -> ProgressBar {
    let pb = ProgressBar::no_length();
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{prefix:.bold} [{bar:30.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec}")
    {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb.set_prefix(format!("[{}/{}] {}", index + 1, total, task.file_name));
    pb
}
