//! Configuration structures and loading logic.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub account: AccountConfig,

    #[serde(default)]
    pub options: OptionsConfig,

    #[serde(default)]
    pub endpoints: EndpointsConfig,

    #[serde(default)]
    pub scraping: ScrapingConfig,
}

/// Account credentials. Only ever read, never written back to disk.
#[derive(Debug, Deserialize)]
pub struct AccountConfig {
    /// Garmin Connect username (usually an email address).
    #[serde(default)]
    pub username: String,

    /// Garmin Connect password.
    #[serde(default = "empty_secret")]
    pub password: SecretString,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: empty_secret(),
        }
    }
}

/// Run options.
#[derive(Debug, Clone, Deserialize)]
pub struct OptionsConfig {
    /// Directory that receives extracted activity files.
    #[serde(default)]
    pub output_directory: Option<PathBuf>,

    /// Root under which per-run staging directories are allocated.
    #[serde(default)]
    pub staging_directory: Option<PathBuf>,

    /// Where raw handshake responses are written when login fails.
    #[serde(default = "default_debug_directory")]
    pub debug_directory: PathBuf,

    /// Activity count for `--latest` runs.
    #[serde(default = "default_latest_count")]
    pub latest_count: u32,

    /// Activity count for full runs.
    #[serde(default = "default_all_count")]
    pub all_count: u32,

    /// Maximum summaries requested per catalog page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Free-text catalog filter. Empty means no filter.
    #[serde(default)]
    pub search: String,

    /// Re-download activities whose files already exist.
    #[serde(default)]
    pub overwrite: bool,

    /// Minimum spacing between archive downloads, in milliseconds.
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,

    /// Extra random delay added on top of the minimum spacing.
    #[serde(default)]
    pub rate_limit_jitter_ms: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Whether to show a progress bar while downloading.
    #[serde(default = "default_true")]
    pub show_progress: bool,

    /// Rename a lone extracted activity file to `<id>.<ext>`.
    #[serde(default)]
    pub rename_extracted: bool,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            output_directory: None,
            staging_directory: None,
            debug_directory: default_debug_directory(),
            latest_count: default_latest_count(),
            all_count: default_all_count(),
            page_size: default_page_size(),
            search: String::new(),
            overwrite: false,
            rate_limit_ms: default_rate_limit_ms(),
            rate_limit_jitter_ms: 0,
            request_timeout_secs: default_request_timeout(),
            show_progress: true,
            rename_extracted: false,
        }
    }
}

/// Remote surface of the service. Every value here is pinned to the
/// service's current behavior and may need updating when it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub sso_base_url: String,
    pub sso_prefix: String,
    pub login_path: String,
    pub connect_base_url: String,
    pub connect_prefix: String,
    pub login_source_url: String,
    pub css_url: String,
    pub activity_search_path: String,
    pub download_service_prefix: String,
    /// Path below the download service; `{id}` is replaced by the activity id.
    pub archive_path_template: String,
    pub archive_extension: String,
    pub activity_extension: String,
    pub start_param: String,
    pub limit_param: String,
    pub search_param: String,
    pub ticket_param: String,
    pub user_agent: String,
    /// Extra header pairs sent with every request.
    pub extra_headers: BTreeMap<String, String>,
    /// Static query parameters sent to the login page.
    pub login_params: BTreeMap<String, String>,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        let login_params = [
            ("locale", "en_US"),
            ("id", "gauth-widget"),
            ("privacyStatementUrl", "//connect.garmin.com/en-US/privacy/"),
            ("clientId", "GarminConnect"),
            ("rememberMeShown", "true"),
            ("rememberMeChecked", "false"),
            ("createAccountShown", "true"),
            ("openCreateAccount", "false"),
            ("displayNameShown", "false"),
            ("consumeServiceTicket", "false"),
            ("initialFocus", "true"),
            ("embedWidget", "false"),
            ("generateExtraServiceTicket", "true"),
            ("generateTwoExtraServiceTickets", "false"),
            ("generateNoServiceTicket", "false"),
            ("globalOptInShown", "true"),
            ("globalOptInChecked", "false"),
            ("mobile", "false"),
            ("connectLegalTerms", "true"),
            ("locationPromptShown", "true"),
            ("showPassword", "true"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            sso_base_url: "https://sso.garmin.com".to_string(),
            sso_prefix: "sso".to_string(),
            login_path: "signin".to_string(),
            connect_base_url: "https://connect.garmin.com".to_string(),
            connect_prefix: "modern".to_string(),
            login_source_url: "https://connect.garmin.com/en-US/signin".to_string(),
            css_url:
                "https://static.garmincdn.com/com.garmin.connect/ui/css/gauth-custom-v1.2-min.css"
                    .to_string(),
            activity_search_path: "proxy/activitylist-service/activities/search/activities"
                .to_string(),
            download_service_prefix: "proxy/download-service/files".to_string(),
            archive_path_template: "activity/{id}".to_string(),
            archive_extension: "zip".to_string(),
            activity_extension: "fit".to_string(),
            start_param: "start".to_string(),
            limit_param: "limit".to_string(),
            search_param: "search".to_string(),
            ticket_param: "ticket".to_string(),
            user_agent: default_user_agent(),
            extra_headers: [("NK".to_string(), "NT".to_string())].into_iter().collect(),
            login_params,
        }
    }
}

impl EndpointsConfig {
    /// Path of one activity's archive below the download service.
    pub fn archive_path(&self, activity_id: u64) -> String {
        self.archive_path_template
            .replace("{id}", &activity_id.to_string())
    }
}

/// Patterns used to pull values out of the login pages.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Regex whose first capture group is the CSRF token.
    pub csrf_pattern: String,
    /// Regex whose first capture group is the service ticket.
    pub ticket_pattern: String,
    /// Embedded JSON variable holding user preferences.
    pub preferences_var: String,
    /// Embedded JSON variable holding the social profile.
    pub social_profile_var: String,
    pub display_name_field: String,
    pub full_name_field: String,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            csrf_pattern: r#"name="_csrf" value="(\w*)"#.to_string(),
            ticket_pattern: r"\?ticket=([\w-]*)".to_string(),
            preferences_var: "VIEWER_USERPREFERENCES".to_string(),
            social_profile_var: "VIEWER_SOCIAL_PROFILE".to_string(),
            display_name_field: "displayName".to_string(),
            full_name_field: "fullName".to_string(),
        }
    }
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new().into())
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (iPad; CPU OS 12_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148".to_string()
}

fn default_debug_directory() -> PathBuf {
    PathBuf::from("debug")
}

fn default_latest_count() -> u32 {
    25
}

fn default_all_count() -> u32 {
    1000
}

fn default_page_size() -> u32 {
    100
}

fn default_rate_limit_ms() -> u64 {
    1000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!(
                    "Configuration file not found: {}. Create one from config.example.toml",
                    path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get the effective output directory.
    pub fn output_directory(&self) -> PathBuf {
        self.options
            .output_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("data").join("fit"))
    }

    /// Get the root under which staging directories are allocated.
    pub fn staging_root(&self) -> PathBuf {
        if let Some(dir) = &self.options.staging_directory {
            return dir.clone();
        }

        ProjectDirs::from("com", "garmin-fetch", "garmin-fetch")
            .map(|dirs| dirs.cache_dir().join("staging"))
            .unwrap_or_else(|| std::env::temp_dir().join("garmin-fetch").join("staging"))
    }

    /// Activity count for a run.
    pub fn activity_count(&self, latest: bool) -> u32 {
        if latest {
            self.options.latest_count
        } else {
            self.options.all_count
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults_without_file_sections() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.options.latest_count, 25);
        assert_eq!(config.options.rate_limit_ms, 1000);
        assert_eq!(config.endpoints.sso_prefix, "sso");
        assert_eq!(config.scraping.preferences_var, "VIEWER_USERPREFERENCES");
        assert!(config.account.password.expose_secret().is_empty());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [account]
            username = "runner@example.com"
            password = "hunter22"

            [options]
            search = "bouldering"
            overwrite = true

            [endpoints]
            connect_prefix = "app"
            "#,
        )
        .unwrap();

        assert_eq!(config.account.username, "runner@example.com");
        assert_eq!(config.account.password.expose_secret(), "hunter22");
        assert_eq!(config.options.search, "bouldering");
        assert!(config.options.overwrite);
        assert_eq!(config.endpoints.connect_prefix, "app");
        assert_eq!(config.endpoints.login_path, "signin");
        assert_eq!(
            config.endpoints.login_params.get("clientId").map(String::as_str),
            Some("GarminConnect")
        );
    }

    #[test]
    fn test_archive_path_substitutes_id() {
        let endpoints = EndpointsConfig::default();
        assert_eq!(endpoints.archive_path(102), "activity/102");
    }

    #[test]
    fn test_activity_count_modes() {
        let config = Config::default();
        assert_eq!(config.activity_count(true), 25);
        assert_eq!(config.activity_count(false), 1000);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/garmin-fetch.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
