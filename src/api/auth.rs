//! Single-sign-on handshake.
//!
//! ```text
//! Start -> CsrfObtained -> CredentialsSubmitted -> TicketObtained -> Authenticated
//!   \___________\_______________\______________________\___________-> Failed
//! ```
//!
//! Every step is attempted once. A failing step leaves the flow in
//! `Failed`, logs the response status, and writes the raw body to the
//! debug directory so the changed page can be inspected.

use std::fmt;
use std::path::{Path, PathBuf};

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::api::scrape::LoginScraper;
use crate::api::session::{header_value, snippet, HttpSession, Page};
use crate::api::types::UserProfile;
use crate::config::EndpointsConfig;
use crate::error::{Error, HandshakeFailure, Result};

/// Login credentials, held only for the duration of the handshake.
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::new(password.into().into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Start,
    CsrfObtained,
    CredentialsSubmitted,
    TicketObtained,
    Authenticated,
    Failed,
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::Start => write!(f, "start"),
            AuthState::CsrfObtained => write!(f, "csrf obtained"),
            AuthState::CredentialsSubmitted => write!(f, "credentials submitted"),
            AuthState::TicketObtained => write!(f, "ticket obtained"),
            AuthState::Authenticated => write!(f, "authenticated"),
            AuthState::Failed => write!(f, "failed"),
        }
    }
}

/// Where raw handshake responses are written on failure.
#[derive(Debug, Clone, Default)]
pub struct DebugArtifacts {
    dir: Option<PathBuf>,
}

impl DebugArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Artifacts that are never written.
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// Write `body` to `name` in the debug directory. Failures only warn.
    pub async fn save(&self, name: &str, body: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let path = dir.join(name);

        let result = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, body).await
        }
        .await;

        match result {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!("Could not write debug artifact {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// A logged-in session. Only obtainable from [`AuthenticationFlow`].
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    connect: HttpSession,
    profile: UserProfile,
}

impl AuthenticatedSession {
    /// Session on the application host, carrying the login cookies.
    pub fn connect(&self) -> &HttpSession {
        &self.connect
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }
}

/// Drives the SSO handshake over a pair of sessions sharing one cookie jar.
pub struct AuthenticationFlow {
    sso: HttpSession,
    connect: HttpSession,
    credentials: Credentials,
    scraper: Box<dyn LoginScraper>,
    artifacts: DebugArtifacts,
    endpoints: EndpointsConfig,
    state: AuthState,
    csrf_token: Option<String>,
    service_ticket: Option<String>,
}

impl AuthenticationFlow {
    pub fn new(
        sso: HttpSession,
        connect: HttpSession,
        credentials: Credentials,
        scraper: Box<dyn LoginScraper>,
        artifacts: DebugArtifacts,
        endpoints: EndpointsConfig,
    ) -> Self {
        Self {
            sso,
            connect,
            credentials,
            scraper,
            artifacts,
            endpoints,
            state: AuthState::Start,
            csrf_token: None,
            service_ticket: None,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Run the whole handshake once.
    pub async fn authenticate(&mut self) -> Result<AuthenticatedSession> {
        if self.state != AuthState::Start {
            return Err(Error::Config(format!(
                "Handshake already ran (state: {})",
                self.state
            )));
        }

        tracing::debug!("Logging in as {}", self.credentials.username);

        match self.handshake().await {
            Ok(session) => {
                tracing::info!(
                    "Logged in: {} ({})",
                    session.profile.full_name,
                    session.profile.display_name
                );
                Ok(session)
            }
            Err(e) => {
                tracing::error!("Login failed after '{}': {}", self.state, e);
                self.state = AuthState::Failed;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> Result<AuthenticatedSession> {
        let params = self.login_params()?;

        let login_page = self.obtain_csrf(&params).await?;
        let post_response = self.submit_credentials(&params, &login_page).await?;
        self.obtain_ticket(&post_response).await?;
        let profile = self.exchange_ticket().await?;

        self.state = AuthState::Authenticated;
        Ok(AuthenticatedSession {
            connect: self.connect.clone(),
            profile,
        })
    }

    /// Start -> CsrfObtained
    async fn obtain_csrf(&mut self, params: &[(String, String)]) -> Result<Page> {
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, header_value(&self.endpoints.login_source_url)?);
        for (name, value) in [
            ("sec-fetch-dest", "document"),
            ("sec-fetch-mode", "navigate"),
            ("sec-fetch-site", "none"),
            ("sec-fetch-user", "?1"),
        ] {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }

        let page = self
            .sso
            .get(&self.endpoints.login_path, &headers, params)
            .await;
        let page = self.checked(page, "login_get.html").await?;

        match self.scraper.csrf_token(&page.body) {
            Some(token) => {
                tracing::debug!("_csrf found ({})", token);
                self.csrf_token = Some(token);
                self.state = AuthState::CsrfObtained;
                Ok(page)
            }
            None => {
                self.structural_failure(
                    HandshakeFailure::CsrfNotFound,
                    &page,
                    "login_get.html",
                )
                .await
            }
        }
    }

    /// CsrfObtained -> CredentialsSubmitted
    async fn submit_credentials(
        &mut self,
        params: &[(String, String)],
        login_page: &Page,
    ) -> Result<Page> {
        let csrf = self
            .csrf_token
            .clone()
            .ok_or(Error::Handshake(HandshakeFailure::CsrfNotFound))?;

        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, header_value(login_page.url.as_str())?);

        let form = vec![
            ("username".to_string(), self.credentials.username.clone()),
            (
                "password".to_string(),
                self.credentials.password.expose_secret().to_string(),
            ),
            ("embed".to_string(), "false".to_string()),
            ("_csrf".to_string(), csrf),
        ];

        let page = self
            .sso
            .post(&self.endpoints.login_path, &headers, params, &form)
            .await;
        let page = self.checked(page, "login_post.html").await?;

        self.state = AuthState::CredentialsSubmitted;
        Ok(page)
    }

    /// CredentialsSubmitted -> TicketObtained
    async fn obtain_ticket(&mut self, response: &Page) -> Result<()> {
        match self.scraper.service_ticket(&response.body) {
            Some(ticket) => {
                tracing::debug!("Service ticket found");
                self.service_ticket = Some(ticket);
                self.state = AuthState::TicketObtained;
                Ok(())
            }
            None => {
                self.structural_failure(
                    HandshakeFailure::TicketNotFound,
                    response,
                    "login_post.html",
                )
                .await
            }
        }
    }

    /// TicketObtained -> profile, ready for Authenticated
    async fn exchange_ticket(&mut self) -> Result<UserProfile> {
        let ticket = match (&self.csrf_token, self.service_ticket.take()) {
            (Some(_), Some(ticket)) => ticket,
            _ => return Err(Error::Handshake(HandshakeFailure::TicketNotFound)),
        };

        let params = vec![(self.endpoints.ticket_param.clone(), ticket)];
        let page = self.connect.get("", &HeaderMap::new(), &params).await;
        let page = self.checked(page, "login_home.html").await?;

        let display_name = self.scraper.display_name(&page.body);
        let full_name = self.scraper.full_name(&page.body);

        match (display_name, full_name) {
            (Some(display_name), Some(full_name)) => Ok(UserProfile {
                display_name,
                full_name,
            }),
            _ => {
                self.structural_failure(
                    HandshakeFailure::ProfileParseFailed,
                    &page,
                    "login_home.html",
                )
                .await
            }
        }
    }

    /// Query parameters describing the redirect the login page should perform.
    fn login_params(&self) -> Result<Vec<(String, String)>> {
        let service = self.connect.url("")?.to_string();
        let gauth_host = self.sso.url("")?.to_string();

        let mut params = vec![
            ("service".to_string(), service.clone()),
            (
                "webhost".to_string(),
                self.endpoints.connect_base_url.clone(),
            ),
            (
                "source".to_string(),
                self.endpoints.login_source_url.clone(),
            ),
            ("redirectAfterAccountLoginUrl".to_string(), service.clone()),
            ("redirectAfterAccountCreationUrl".to_string(), service),
            ("gauthHost".to_string(), gauth_host),
            ("cssUrl".to_string(), self.endpoints.css_url.clone()),
        ];
        params.extend(
            self.endpoints
                .login_params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        Ok(params)
    }

    /// Log a failed request and write a status error's body to `artifact`.
    async fn checked(&self, result: Result<Page>, artifact: &str) -> Result<Page> {
        let e = match result {
            Ok(page) => return Ok(page),
            Err(e) => e,
        };

        match &e {
            Error::HttpStatus { status, url, body } => {
                let saved = self.artifacts.save(artifact, body).await;
                tracing::error!(
                    "Login request to {} returned HTTP {}{}",
                    url,
                    status,
                    saved_note(saved.as_deref())
                );
            }
            other => tracing::error!("Login request failed: {}", other),
        }

        Err(e)
    }

    async fn structural_failure<T>(
        &self,
        failure: HandshakeFailure,
        page: &Page,
        artifact: &str,
    ) -> Result<T> {
        let saved = self.artifacts.save(artifact, &page.body).await;
        tracing::error!(
            "{} (HTTP {}, {}){}",
            failure,
            page.status.as_u16(),
            page.url,
            saved_note(saved.as_deref())
        );
        tracing::debug!("Response body: {}", snippet(&page.body));
        Err(Error::Handshake(failure))
    }
}

fn saved_note(saved: Option<&Path>) -> String {
    saved
        .map(|p| format!(", response saved to {}", p.display()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::scrape::RegexScraper;
    use crate::config::ScrapingConfig;
    use std::time::Duration;

    fn flow() -> AuthenticationFlow {
        let endpoints = EndpointsConfig::default();
        let connect = HttpSession::new(
            &endpoints,
            "https://connect.example.com",
            "modern",
            Duration::from_secs(5),
        )
        .unwrap();
        let sso = connect.sibling("https://sso.example.com", "sso").unwrap();
        AuthenticationFlow::new(
            sso,
            connect,
            Credentials::new("runner@example.com", "pw"),
            Box::new(RegexScraper::new(&ScrapingConfig::default()).unwrap()),
            DebugArtifacts::disabled(),
            endpoints,
        )
    }

    #[test]
    fn test_new_flow_starts_at_start() {
        assert_eq!(flow().state(), AuthState::Start);
    }

    #[test]
    fn test_login_params_point_back_at_connect() {
        let params = flow().login_params().unwrap();
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("service"), Some("https://connect.example.com/modern"));
        assert_eq!(get("gauthHost"), Some("https://sso.example.com/sso"));
        assert_eq!(get("clientId"), Some("GarminConnect"));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("runner@example.com", "hunter22");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("runner@example.com"));
        assert!(!printed.contains("hunter22"));
    }

    #[tokio::test]
    async fn test_debug_artifacts_written() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = DebugArtifacts::new(dir.path().join("debug"));
        let path = artifacts.save("login_get.html", "<html/>").await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<html/>");
    }

    #[tokio::test]
    async fn test_disabled_artifacts_write_nothing() {
        assert!(DebugArtifacts::disabled()
            .save("login_get.html", "x")
            .await
            .is_none());
    }
}
