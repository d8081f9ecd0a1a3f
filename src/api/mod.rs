//! Garmin Connect access.
//!
//! This module provides:
//! - A cookie-sharing HTTP session with browser disguise headers
//! - Request pacing
//! - The SSO login handshake and the scraping it relies on
//! - Activity search
//! - API response types

pub mod auth;
pub mod catalog;
pub mod rate_limit;
pub mod scrape;
pub mod session;
pub mod types;

pub use auth::{AuthState, AuthenticatedSession, AuthenticationFlow, Credentials, DebugArtifacts};
pub use catalog::ActivityCatalog;
pub use rate_limit::RateLimiter;
pub use scrape::{LoginScraper, RegexScraper};
pub use session::{disguise_headers, HttpSession, Page};
pub use types::*;
