//! Activity archive downloading.

use std::path::Path;
use std::sync::Arc;

use indicatif::ProgressBar;

use crate::api::{ActivityCatalog, ActivitySummary, AuthenticatedSession, HttpSession, RateLimiter};
use crate::cancel::CancelSignal;
use crate::config::EndpointsConfig;
use crate::download::state::DownloadState;
use crate::download::task::{DownloadTask, TaskAction};
use crate::error::{Error, Result};
use crate::fs::naming::partial_path;
use crate::fs::StagingArea;
use crate::output::create_item_bar;

/// Fetches per-activity archives into a staging area, one at a time.
pub struct ArchiveDownloader {
    session: HttpSession,
    endpoints: EndpointsConfig,
    limiter: Arc<RateLimiter>,
    show_progress: bool,
}

impl ArchiveDownloader {
    pub fn new(
        session: &AuthenticatedSession,
        endpoints: &EndpointsConfig,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            session: session.connect().inherit(&endpoints.download_service_prefix),
            endpoints: endpoints.clone(),
            limiter,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// List up to `count` activities and download the missing ones.
    #[allow(clippy::too_many_arguments)]
    pub async fn get_activities(
        &self,
        catalog: &ActivityCatalog,
        directory: &Path,
        count: u32,
        page_size: u32,
        filter: &str,
        staging: &StagingArea,
        overwrite: bool,
        cancel: &CancelSignal,
    ) -> DownloadState {
        tracing::info!(
            "Getting activities: '{}' ({}) temp {}",
            directory.display(),
            count,
            staging.path().display()
        );
        let summaries = catalog.collect(count, page_size, filter, cancel).await;
        self.download_all(&summaries, directory, staging, overwrite, cancel)
            .await
    }

    /// Download each listed activity in catalog order. Per-activity failures
    /// are recorded and the loop moves on.
    pub async fn download_all(
        &self,
        summaries: &[ActivitySummary],
        directory: &Path,
        staging: &StagingArea,
        overwrite: bool,
        cancel: &CancelSignal,
    ) -> DownloadState {
        let mut state = DownloadState {
            listed: summaries.len() as u64,
            ..Default::default()
        };

        let progress = if self.show_progress {
            create_item_bar(summaries.len() as u64, "Activities")
        } else {
            ProgressBar::hidden()
        };

        for summary in summaries {
            if cancel.is_cancelled() {
                tracing::info!("Cancelled; stopping before activity {}", summary.activity_id);
                state.cancelled = true;
                break;
            }

            self.process(summary, directory, staging, overwrite, &mut state)
                .await;
            progress.inc(1);
        }

        progress.finish_and_clear();
        tracing::info!(
            "Downloads complete: {} downloaded, {} skipped, {} failed",
            state.downloaded,
            state.skipped(),
            state.failed
        );
        state
    }

    async fn process(
        &self,
        summary: &ActivitySummary,
        directory: &Path,
        staging: &StagingArea,
        overwrite: bool,
        state: &mut DownloadState,
    ) {
        let activity_id = summary.activity_id;

        if !state.mark_seen(activity_id) {
            tracing::debug!("Skipping duplicate listing of activity {}", activity_id);
            state.increment_duplicate();
            return;
        }

        let task = match self.plan(summary, directory, staging, overwrite).await {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!("Cannot plan download of activity {}: {}", activity_id, e);
                state.record_failure(activity_id);
                return;
            }
        };

        match task.action() {
            TaskAction::SkipExisting => {
                tracing::debug!("Skipping existing file: {}", task.destination.display());
                state.skipped_existing += 1;
            }
            TaskAction::ReuseStaged => {
                tracing::debug!("Reusing staged archive: {}", task.staging_file.display());
                state.reused_staged += 1;
            }
            TaskAction::Download => {
                tracing::info!("Saving {} to {}", summary.label(), task.destination.display());
                match self.fetch(&task).await {
                    Ok(bytes) => state.record_download(bytes),
                    Err(e) => {
                        tracing::error!("Exception downloading activity file {}: {}", activity_id, e);
                        state.record_failure(activity_id);
                    }
                }
            }
        }
    }

    /// Decide what to do about one listed activity.
    pub async fn plan(
        &self,
        summary: &ActivitySummary,
        directory: &Path,
        staging: &StagingArea,
        overwrite: bool,
    ) -> Result<DownloadTask> {
        DownloadTask::plan(
            summary.activity_id,
            directory,
            &self.endpoints.activity_extension,
            staging,
            overwrite,
        )
        .await
    }

    /// Download one archive, waiting on the rate limiter first. The body
    /// lands in a `.part` file that is renamed once complete.
    pub async fn fetch(&self, task: &DownloadTask) -> Result<u64> {
        let partial = partial_path(&task.staging_file);
        let path = self.endpoints.archive_path(task.activity_id);

        self.limiter.acquire().await;
        let bytes = self.session.download_binary(&path, &partial).await?;

        tokio::fs::rename(&partial, &task.staging_file)
            .await
            .map_err(|e| Error::filesystem(&task.staging_file, e))?;
        tracing::debug!(
            "Staged {} ({} bytes)",
            task.staging_file.display(),
            bytes
        );

        Ok(bytes)
    }
}
