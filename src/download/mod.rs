//! Download module for activity archives.
//!
//! This module provides:
//! - Download state tracking
//! - Per-activity skip/overwrite decisions
//! - Rate-limited archive downloading into a staging area

pub mod archive;
pub mod state;
pub mod task;

pub use archive::ArchiveDownloader;
pub use state::DownloadState;
pub use task::{DownloadTask, TaskAction};
