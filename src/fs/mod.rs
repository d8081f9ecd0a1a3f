//! Filesystem module.
//!
//! Provides:
//! - Path and directory management
//! - Filename generation and matching
//! - Per-run staging directories
//! - Archive extraction

pub mod extract;
pub mod naming;
pub mod paths;
pub mod staging;

pub use extract::{ExtractionReport, ExtractionStage};
pub use naming::{activity_file_name, sanitize_filename, staged_archive_name};
pub use paths::{activity_destination, activity_present, ensure_dir, file_exists};
pub use staging::StagingArea;
