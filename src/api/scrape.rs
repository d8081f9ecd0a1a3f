//! Extraction of handshake values from login pages.
//!
//! The login flow only asks "given this body, give me field X"; how the
//! field is found lives here so it can follow the service's markup
//! without touching the handshake sequencing.

use regex::Regex;
use serde_json::Value;

use crate::config::ScrapingConfig;
use crate::error::{Error, Result};

/// Pulls handshake values out of response bodies.
pub trait LoginScraper: Send + Sync {
    /// CSRF token from the login page. `None` when absent or empty.
    fn csrf_token(&self, body: &str) -> Option<String>;

    /// Service ticket from the credential POST response.
    fn service_ticket(&self, body: &str) -> Option<String>;

    /// Display name from the application home page.
    fn display_name(&self, body: &str) -> Option<String>;

    /// Full name from the application home page.
    fn full_name(&self, body: &str) -> Option<String>;
}

/// Regex-driven scraper built from [`ScrapingConfig`].
#[derive(Debug, Clone)]
pub struct RegexScraper {
    csrf: Regex,
    ticket: Regex,
    preferences: Regex,
    social_profile: Regex,
    display_name_field: String,
    full_name_field: String,
}

impl RegexScraper {
    pub fn new(config: &ScrapingConfig) -> Result<Self> {
        Ok(Self {
            csrf: compile("scraping.csrf_pattern", &config.csrf_pattern)?,
            ticket: compile("scraping.ticket_pattern", &config.ticket_pattern)?,
            preferences: assignment_pattern(&config.preferences_var)?,
            social_profile: assignment_pattern(&config.social_profile_var)?,
            display_name_field: config.display_name_field.clone(),
            full_name_field: config.full_name_field.clone(),
        })
    }
}

impl LoginScraper for RegexScraper {
    fn csrf_token(&self, body: &str) -> Option<String> {
        first_capture(&self.csrf, body)
    }

    fn service_ticket(&self, body: &str) -> Option<String> {
        first_capture(&self.ticket, body)
    }

    fn display_name(&self, body: &str) -> Option<String> {
        string_field(&embedded_json(&self.preferences, body)?, &self.display_name_field)
    }

    fn full_name(&self, body: &str) -> Option<String> {
        string_field(&embedded_json(&self.social_profile, body)?, &self.full_name_field)
    }
}

fn compile(field: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::ConfigValidation {
        field: field.to_string(),
        message: format!("Invalid regex: {}", e),
    })
}

/// Matches `VAR = {...};` on a single line.
fn assignment_pattern(var: &str) -> Result<Regex> {
    compile(
        "scraping embedded variable",
        &format!(r"{} = (\{{.*\}});", regex::escape(var)),
    )
}

fn first_capture(regex: &Regex, body: &str) -> Option<String> {
    let value = regex.captures(body)?.get(1)?.as_str();
    (!value.is_empty()).then(|| value.to_string())
}

/// Decode the object assigned to a page variable. The page escapes quotes
/// inside the object literal, so those are unescaped before decoding.
fn embedded_json(regex: &Regex, body: &str) -> Option<Value> {
    let raw = regex.captures(body)?.get(1)?.as_str();
    match serde_json::from_str(&raw.replace("\\\"", "\"")) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Embedded JSON did not decode: {}", e);
            None
        }
    }
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value.get(field)?.as_str().map(str::to_string)
}
