//! Configuration module for garmin-fetch.
//!
//! This module handles:
//! - Loading configuration from TOML files
//! - Describing the remote service surface (endpoints and scraping patterns)
//! - Configuration validation

pub mod loader;
pub mod validation;

pub use loader::{AccountConfig, Config, EndpointsConfig, OptionsConfig, ScrapingConfig};
pub use validation::validate_config;
