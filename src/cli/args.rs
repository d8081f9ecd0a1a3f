//! Command-line argument definitions using clap.

use clap::{ArgAction, Parser};
use secrecy::SecretString;
use std::path::PathBuf;

use crate::config::Config;

/// Garmin Connect activity fetcher CLI.
#[derive(Parser, Debug)]
#[command(
    name = "garmin-fetch",
    version,
    about = "Download activity files from Garmin Connect",
    long_about = "Log in to Garmin Connect, list recent activities and download the ones\n\
                  not yet present locally, then unpack them into the output directory."
)]
pub struct Args {
    /// Path to configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Directory that receives extracted activity files.
    #[arg(short = 'd', long = "directory")]
    pub output_directory: Option<PathBuf>,

    /// Number of activities to fetch. Overrides --latest.
    #[arg(short = 'n', long)]
    pub count: Option<u32>,

    /// Only fetch the most recent activities (options.latest_count).
    #[arg(short, long)]
    pub latest: bool,

    /// Download activities even if their files already exist.
    #[arg(short, long)]
    pub overwrite: bool,

    /// Increase log verbosity (-t debug, -tt trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub trace: u8,

    /// Garmin Connect username.
    #[arg(long, env = "GARMIN_USERNAME")]
    pub username: Option<String>,

    /// Garmin Connect password.
    #[arg(long, env = "GARMIN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Free-text filter for the activity search.
    #[arg(long)]
    pub search: Option<String>,

    /// Root directory for per-run staging directories.
    #[arg(long = "staging-dir")]
    pub staging_directory: Option<PathBuf>,

    /// Continue from the staging directory of a cancelled run.
    #[arg(long = "resume-staging")]
    pub resume_staging: Option<PathBuf>,

    /// Minimum milliseconds between archive downloads.
    #[arg(long = "rate-limit-ms")]
    pub rate_limit_ms: Option<u64>,

    /// Directory for raw login responses when the handshake fails.
    #[arg(long = "debug-dir")]
    pub debug_directory: Option<PathBuf>,

    /// Rename extracted files to <activity id>.<ext>.
    #[arg(long)]
    pub rename: bool,

    /// Hide the progress bar and banner.
    #[arg(long, short)]
    pub quiet: bool,
}

impl Args {
    /// Merge CLI arguments into an existing config, overriding where specified.
    pub fn merge_into_config(&self, config: &mut Config) {
        if let Some(username) = &self.username {
            config.account.username = username.clone();
        }

        if let Some(password) = &self.password {
            config.account.password = SecretString::new(password.clone().into());
        }

        if let Some(dir) = &self.output_directory {
            config.options.output_directory = Some(dir.clone());
        }

        if let Some(dir) = &self.staging_directory {
            config.options.staging_directory = Some(dir.clone());
        }

        if let Some(dir) = &self.debug_directory {
            config.options.debug_directory = dir.clone();
        }

        if let Some(search) = &self.search {
            config.options.search = search.clone();
        }

        if let Some(ms) = self.rate_limit_ms {
            config.options.rate_limit_ms = ms;
        }

        // Boolean flags (only override if set to non-default)
        if self.overwrite {
            config.options.overwrite = true;
        }

        if self.rename {
            config.options.rename_extracted = true;
        }

        if self.quiet {
            config.options.show_progress = false;
        }
    }

    /// Number of activities requested for this run.
    pub fn activity_count(&self, config: &Config) -> u32 {
        self.count
            .unwrap_or_else(|| config.activity_count(self.latest))
    }

    /// Log level implied by the `--trace` count.
    pub fn log_level(&self) -> &'static str {
        match self.trace {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
