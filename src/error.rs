//! Error types for the garmin-fetch application.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Structural failures while scraping the login handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeFailure {
    CsrfNotFound,
    TicketNotFound,
    ProfileParseFailed,
}

impl HandshakeFailure {
    /// Stable reason string, also used in diagnostics.
    pub fn reason(&self) -> &'static str {
        match self {
            HandshakeFailure::CsrfNotFound => "csrf_not_found",
            HandshakeFailure::TicketNotFound => "ticket_not_found",
            HandshakeFailure::ProfileParseFailed => "profile_parse_failed",
        }
    }
}

impl fmt::Display for HandshakeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    // Remote service errors
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Handshake failed: {0}")]
    Handshake(HandshakeFailure),

    #[error("Authentication failed: {0}")]
    Authentication(#[source] Box<Error>),

    // Archive and file system errors
    #[error("Archive error in {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },

    #[error("File system error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid filename (path traversal attempt): {0}")]
    InvalidFilename(String),

    #[error("Run cancelled")]
    Cancelled,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // URL parsing errors
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Wrap an I/O error with the path it happened at.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// The handshake reason, looking through an `Authentication` wrapper.
    pub fn handshake_failure(&self) -> Option<HandshakeFailure> {
        match self {
            Error::Handshake(failure) => Some(*failure),
            Error::Authentication(inner) => inner.handshake_failure(),
            _ => None,
        }
    }

    /// Raw response body carried by a status error, if any.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Error::HttpStatus { body, .. } => Some(body),
            Error::Authentication(inner) => inner.response_body(),
            _ => None,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit codes.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const ABORT: i32 = 1;
    pub const AUTH_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const FILESYSTEM_ERROR: i32 = 4;
    pub const UNEXPECTED_ERROR: i32 = 5;
    pub const SOME_ITEMS_FAILED: i32 = 6;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_reason_strings() {
        assert_eq!(HandshakeFailure::CsrfNotFound.to_string(), "csrf_not_found");
        assert_eq!(HandshakeFailure::TicketNotFound.to_string(), "ticket_not_found");
        assert_eq!(
            HandshakeFailure::ProfileParseFailed.to_string(),
            "profile_parse_failed"
        );
    }

    #[test]
    fn test_handshake_failure_through_wrapper() {
        let err = Error::Authentication(Box::new(Error::Handshake(
            HandshakeFailure::TicketNotFound,
        )));
        assert_eq!(err.handshake_failure(), Some(HandshakeFailure::TicketNotFound));
        assert!(err.to_string().contains("ticket_not_found"));
    }

    #[test]
    fn test_response_body_from_status_error() {
        let err = Error::HttpStatus {
            status: 403,
            url: "https://example.invalid/sso/signin".into(),
            body: "blocked".into(),
        };
        assert_eq!(err.response_body(), Some("blocked"));
        assert_eq!(err.to_string(), "HTTP 403 from https://example.invalid/sso/signin");
    }
}
