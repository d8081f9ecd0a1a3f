//! Configuration validation logic.

use regex::Regex;
use secrecy::ExposeSecret;

use crate::config::loader::{Config, EndpointsConfig, OptionsConfig, ScrapingConfig};
use crate::error::{Error, Result};

/// Minimum username length.
const MIN_USERNAME_LENGTH: usize = 3;

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_credentials(&config.account.username, config.account.password.expose_secret())?;
    validate_options(&config.options)?;
    validate_endpoints(&config.endpoints)?;
    validate_scraping(&config.scraping)?;

    Ok(())
}

/// Validate the account credentials.
pub fn validate_credentials(username: &str, password: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(Error::MissingConfig("account.username".to_string()));
    }

    if username.trim().len() < MIN_USERNAME_LENGTH {
        return Err(Error::ConfigValidation {
            field: "account.username".to_string(),
            message: format!(
                "Username must be at least {} characters (got {})",
                MIN_USERNAME_LENGTH,
                username.trim().len()
            ),
        });
    }

    if password.is_empty() {
        return Err(Error::MissingConfig("account.password".to_string()));
    }

    // Check for placeholder values
    for (field, value) in [("account.username", username), ("account.password", password)] {
        let lower = value.to_lowercase();
        if lower.contains("replaceme") || lower.starts_with("your_") {
            return Err(Error::ConfigValidation {
                field: field.to_string(),
                message: "Value appears to be a placeholder. Please provide your Garmin Connect login."
                    .to_string(),
            });
        }
    }

    Ok(())
}

/// Validate counts and pacing.
pub fn validate_options(options: &OptionsConfig) -> Result<()> {
    for (field, value) in [
        ("options.latest_count", options.latest_count),
        ("options.all_count", options.all_count),
        ("options.page_size", options.page_size),
    ] {
        if value == 0 {
            return Err(Error::ConfigValidation {
                field: field.to_string(),
                message: "Must be greater than zero".to_string(),
            });
        }
    }

    if options.rate_limit_ms == 0 {
        return Err(Error::ConfigValidation {
            field: "options.rate_limit_ms".to_string(),
            message: "Archive downloads must be spaced; a zero delay gets the account throttled"
                .to_string(),
        });
    }

    if options.request_timeout_secs == 0 {
        return Err(Error::ConfigValidation {
            field: "options.request_timeout_secs".to_string(),
            message: "Must be greater than zero".to_string(),
        });
    }

    Ok(())
}

/// Validate the remote surface description.
pub fn validate_endpoints(endpoints: &EndpointsConfig) -> Result<()> {
    for (field, value) in [
        ("endpoints.sso_base_url", &endpoints.sso_base_url),
        ("endpoints.connect_base_url", &endpoints.connect_base_url),
    ] {
        url::Url::parse(value).map_err(|e| Error::ConfigValidation {
            field: field.to_string(),
            message: format!("Not a valid URL: {}", e),
        })?;
    }

    if !endpoints.archive_path_template.contains("{id}") {
        return Err(Error::ConfigValidation {
            field: "endpoints.archive_path_template".to_string(),
            message: format!(
                "Template '{}' must contain the {{id}} placeholder",
                endpoints.archive_path_template
            ),
        });
    }

    for (field, value) in [
        ("endpoints.archive_extension", &endpoints.archive_extension),
        ("endpoints.activity_extension", &endpoints.activity_extension),
    ] {
        if value.is_empty() || value.contains('.') || value.contains('/') {
            return Err(Error::ConfigValidation {
                field: field.to_string(),
                message: format!("'{}' is not a bare file extension", value),
            });
        }
    }

    Ok(())
}

/// Validate the scraping patterns.
pub fn validate_scraping(scraping: &ScrapingConfig) -> Result<()> {
    validate_pattern("scraping.csrf_pattern", &scraping.csrf_pattern)?;
    validate_pattern("scraping.ticket_pattern", &scraping.ticket_pattern)?;

    for (field, value) in [
        ("scraping.preferences_var", &scraping.preferences_var),
        ("scraping.social_profile_var", &scraping.social_profile_var),
        ("scraping.display_name_field", &scraping.display_name_field),
        ("scraping.full_name_field", &scraping.full_name_field),
    ] {
        if value.trim().is_empty() {
            return Err(Error::MissingConfig(field.to_string()));
        }
    }

    Ok(())
}

/// A pattern must compile and expose a capture group for the value.
fn validate_pattern(field: &str, pattern: &str) -> Result<()> {
    let regex = Regex::new(pattern).map_err(|e| Error::ConfigValidation {
        field: field.to_string(),
        message: format!("Invalid regex: {}", e),
    })?;

    if regex.captures_len() < 2 {
        return Err(Error::ConfigValidation {
            field: field.to_string(),
            message: "Pattern needs a capture group for the extracted value".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_credentials() {
        assert!(validate_credentials("runner@example.com", "s3cret!").is_ok());
    }

    #[test]
    fn test_missing_credentials() {
        assert!(matches!(
            validate_credentials("", "pw"),
            Err(Error::MissingConfig(_))
        ));
        assert!(matches!(
            validate_credentials("runner@example.com", ""),
            Err(Error::MissingConfig(_))
        ));
    }

    #[test]
    fn test_placeholder_credentials() {
        assert!(validate_credentials("replaceme", "pw12345").is_err());
        assert!(validate_credentials("runner@example.com", "your_password").is_err());
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let options = OptionsConfig {
            rate_limit_ms: 0,
            ..Default::default()
        };
        assert!(validate_options(&options).is_err());
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let options = OptionsConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(validate_options(&options).is_err());
    }

    #[test]
    fn test_default_endpoints_and_patterns_are_valid() {
        assert!(validate_endpoints(&EndpointsConfig::default()).is_ok());
        assert!(validate_scraping(&ScrapingConfig::default()).is_ok());
    }

    #[test]
    fn test_template_without_id_rejected() {
        let endpoints = EndpointsConfig {
            archive_path_template: "activity/latest".to_string(),
            ..Default::default()
        };
        assert!(validate_endpoints(&endpoints).is_err());
    }

    #[test]
    fn test_pattern_without_group_rejected() {
        let scraping = ScrapingConfig {
            csrf_pattern: r"_csrf".to_string(),
            ..Default::default()
        };
        assert!(validate_scraping(&scraping).is_err());

        let scraping = ScrapingConfig {
            ticket_pattern: r"(unclosed".to_string(),
            ..Default::default()
        };
        assert!(validate_scraping(&scraping).is_err());
    }
}
