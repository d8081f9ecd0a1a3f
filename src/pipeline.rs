//! One end-to-end fetch run.
//!
//! Stages run strictly in order: handshake, catalog + downloads into a
//! private staging directory, extraction into the output directory, then
//! staging cleanup. Only a failed handshake or a filesystem setup error
//! aborts the run; per-activity problems end up in [`RunResult`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;

use crate::api::{
    ActivityCatalog, AuthenticatedSession, AuthenticationFlow, Credentials, DebugArtifacts,
    HttpSession, RateLimiter, RegexScraper, UserProfile,
};
use crate::cancel::CancelSignal;
use crate::config::Config;
use crate::decode::{decode_extracted, ActivityDecoder, DecodeReport};
use crate::download::{ArchiveDownloader, DownloadState};
use crate::error::{Error, Result};
use crate::fs::{ensure_dir, ExtractionReport, ExtractionStage, StagingArea};

/// Summary of one run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub profile: UserProfile,
    pub started_at: DateTime<Utc>,
    pub listed: u64,
    /// Download requests issued.
    pub attempted: u64,
    pub downloaded: u64,
    /// Already present in the output directory, or listed twice.
    pub skipped: u64,
    /// Taken from a resumed staging directory.
    pub reused: u64,
    pub failed: u64,
    pub failed_ids: Vec<u64>,
    pub archives_extracted: u64,
    pub extracted_files: Vec<PathBuf>,
    pub extraction_failures: u64,
    pub decoded: u64,
    pub decode_failures: u64,
    pub cancelled: bool,
    /// Staging directory left behind by a cancelled run.
    pub staging_dir: Option<PathBuf>,
}

impl RunResult {
    fn new(profile: UserProfile, started_at: DateTime<Utc>, state: &DownloadState) -> Self {
        Self {
            profile,
            started_at,
            listed: state.listed,
            attempted: state.attempted(),
            downloaded: state.downloaded,
            skipped: state.skipped_existing + state.duplicate_count,
            reused: state.reused_staged,
            failed: state.failed,
            failed_ids: state.failed_ids.clone(),
            archives_extracted: 0,
            extracted_files: Vec::new(),
            extraction_failures: 0,
            decoded: 0,
            decode_failures: 0,
            cancelled: state.cancelled,
            staging_dir: None,
        }
    }

    fn apply_extraction(&mut self, report: ExtractionReport) {
        self.archives_extracted = report.archives_extracted;
        self.extraction_failures = report.failures.len() as u64;
        self.extracted_files = report.files;
    }

    fn apply_decode(&mut self, report: &DecodeReport) {
        self.decoded = report.decoded.len() as u64;
        self.decode_failures = report.failures.len() as u64;
    }

    /// Whether any activity failed to download, extract or decode.
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.extraction_failures > 0 || self.decode_failures > 0
    }
}

/// Composes handshake, catalog, downloader and extraction into one run.
pub struct FetchPipeline {
    config: Config,
    credentials: Credentials,
    decoder: Option<Box<dyn ActivityDecoder>>,
    resume_staging: Option<PathBuf>,
}

impl FetchPipeline {
    pub fn new(config: Config, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
            decoder: None,
            resume_staging: None,
        }
    }

    /// Hand extracted files to `decoder` after extraction.
    pub fn with_decoder(mut self, decoder: Box<dyn ActivityDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Reuse the staging directory of an earlier cancelled run.
    pub fn with_staging(mut self, path: Option<PathBuf>) -> Self {
        self.resume_staging = path;
        self
    }

    /// Run every stage once.
    pub async fn run(
        &self,
        output_dir: &Path,
        count: u32,
        overwrite: bool,
        cancel: &CancelSignal,
    ) -> Result<RunResult> {
        let started_at = Utc::now();
        let options = &self.config.options;
        let endpoints = &self.config.endpoints;

        let session = self.authenticate().await?;
        let profile = session.profile().clone();
        tracing::info!("Logged in as {}", profile.display_name);

        // Nothing staged yet, so there is nothing to keep.
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        ensure_dir(output_dir).await?;
        let staging = match &self.resume_staging {
            Some(path) => StagingArea::resume(path, &endpoints.archive_extension).await?,
            None => {
                StagingArea::allocate(&self.config.staging_root(), &endpoints.archive_extension)
                    .await?
            }
        };

        let interval = Duration::from_millis(options.rate_limit_ms);
        let limiter = Arc::new(
            RateLimiter::new(interval).with_jitter(Duration::from_millis(options.rate_limit_jitter_ms)),
        );
        let catalog = ActivityCatalog::new(&session, endpoints, interval);
        let downloader =
            ArchiveDownloader::new(&session, endpoints, limiter).with_progress(options.show_progress);

        let state = downloader
            .get_activities(
                &catalog,
                output_dir,
                count,
                options.page_size,
                &options.search,
                &staging,
                overwrite,
                cancel,
            )
            .await;
        let mut result = RunResult::new(profile, started_at, &state);

        if result.cancelled || cancel.is_cancelled() {
            return Ok(Self::keep_staging(result, &staging));
        }

        let report = ExtractionStage::new(&endpoints.archive_extension, &endpoints.activity_extension)
            .with_rename(options.rename_extracted)
            .extract(staging.path(), output_dir)
            .await?;
        result.apply_extraction(report);

        if let Err(e) = staging.finish().await {
            tracing::warn!("Could not remove staging directory: {}", e);
        }

        if cancel.is_cancelled() {
            result.cancelled = true;
            return Ok(result);
        }

        if let Some(decoder) = &self.decoder {
            let report =
                decode_extracted(decoder.as_ref(), &result.extracted_files, &endpoints.activity_extension)
                    .await;
            result.apply_decode(&report);
        }

        Ok(result)
    }

    async fn authenticate(&self) -> Result<AuthenticatedSession> {
        let endpoints = &self.config.endpoints;
        let timeout = Duration::from_secs(self.config.options.request_timeout_secs);

        let connect = HttpSession::new(
            endpoints,
            &endpoints.connect_base_url,
            &endpoints.connect_prefix,
            timeout,
        )?;
        let sso = connect.sibling(&endpoints.sso_base_url, &endpoints.sso_prefix)?;
        let scraper = RegexScraper::new(&self.config.scraping)?;
        let credentials = Credentials::new(
            self.credentials.username.clone(),
            self.credentials.password.expose_secret(),
        );

        let mut flow = AuthenticationFlow::new(
            sso,
            connect,
            credentials,
            Box::new(scraper),
            DebugArtifacts::new(&self.config.options.debug_directory),
            endpoints.clone(),
        );

        let outcome = flow.authenticate().await;
        outcome.map_err(|e| {
            tracing::error!("Login failed in state {}: {}", flow.state(), e);
            Error::Authentication(Box::new(e))
        })
    }

    fn keep_staging(mut result: RunResult, staging: &StagingArea) -> RunResult {
        tracing::info!(
            "Run cancelled; staged archives kept in {}",
            staging.path().display()
        );
        result.cancelled = true;
        result.staging_dir = Some(staging.path().to_path_buf());
        result
    }
}
