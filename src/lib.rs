//! garmin-fetch - authenticated activity download pipeline for Garmin Connect.
//!
//! This library logs in through the SSO handshake, pages through the
//! activity catalog, downloads missing activity archives one at a time
//! under a rate limit, and unpacks them into an output directory.
//!
//! # Features
//!
//! - SSO login state machine with debug artifacts on failure
//! - Paginated activity search with an optional filter
//! - Idempotent downloads (existing files are skipped unless overwriting)
//! - Per-run staging directories, resumable after cancellation
//! - Optional hand-off of extracted files to an external decoder
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use garmin_fetch::{CancelSignal, Config, Credentials, FetchPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Path::new("config.toml"))?;
//!     let credentials = Credentials::new("runner@example.com", "secret");
//!     let output = config.output_directory();
//!
//!     let pipeline = FetchPipeline::new(config, credentials);
//!     let result = pipeline.run(&output, 25, false, &CancelSignal::never()).await?;
//!     println!("{} downloaded", result.downloaded);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod decode;
pub mod download;
pub mod error;
pub mod fs;
pub mod output;
pub mod pipeline;

// Re-exports for convenience
pub use api::{ActivityCatalog, AuthenticationFlow, Credentials, HttpSession, RateLimiter};
pub use cancel::{CancelHandle, CancelSignal};
pub use config::Config;
pub use decode::{decode_extracted, ActivityDecoder, DecodedMessages};
pub use download::{ArchiveDownloader, DownloadState};
pub use error::{Error, Result};
pub use fs::{ExtractionStage, StagingArea};
pub use pipeline::{FetchPipeline, RunResult};
