//! Cookie-bearing HTTP session scoped to one host and path prefix.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::cookie::Jar;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::config::EndpointsConfig;
use crate::error::{Error, Result};

/// Longest body snippet kept in status errors and debug logs.
const BODY_SNIPPET_LIMIT: usize = 2048;

/// A fully read text response.
#[derive(Debug, Clone)]
pub struct Page {
    pub status: StatusCode,
    /// Final URL after redirects.
    pub url: Url,
    pub body: String,
}

impl Page {
    /// Decode the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// HTTP client bound to `base_url/prefix`, sharing its cookie jar and
/// disguise headers with every session inherited from it.
#[derive(Debug, Clone)]
pub struct HttpSession {
    client: Client,
    jar: Arc<Jar>,
    base_url: String,
    prefix: String,
}

impl HttpSession {
    /// Create a session with a fresh cookie jar.
    pub fn new(
        endpoints: &EndpointsConfig,
        base_url: &str,
        prefix: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let client = build_client(endpoints, jar.clone(), timeout)?;
        Self::with_client(client, jar, base_url, prefix)
    }

    /// A session on another host that shares this session's cookie jar and headers.
    pub fn sibling(&self, base_url: &str, prefix: &str) -> Result<Self> {
        Self::with_client(self.client.clone(), self.jar.clone(), base_url, prefix)
    }

    /// A session on the same host under `prefix` appended to this session's prefix.
    pub fn inherit(&self, prefix: &str) -> Self {
        Self {
            client: self.client.clone(),
            jar: self.jar.clone(),
            base_url: self.base_url.clone(),
            prefix: join_path(&self.prefix, prefix),
        }
    }

    fn with_client(client: Client, jar: Arc<Jar>, base_url: &str, prefix: &str) -> Result<Self> {
        // Validate once so that later joins can only fail on bad paths.
        Url::parse(base_url)?;
        Ok(Self {
            client,
            jar,
            base_url: base_url.trim_end_matches('/').to_string(),
            prefix: prefix.trim_matches('/').to_string(),
        })
    }

    /// Absolute URL for `path` under this session's prefix.
    pub fn url(&self, path: &str) -> Result<Url> {
        let path = join_path(&self.prefix, path);
        let url = if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path)
        };
        Ok(Url::parse(&url)?)
    }

    /// The cookie jar shared by this session family.
    pub fn cookie_jar(&self) -> Arc<Jar> {
        self.jar.clone()
    }

    /// GET `path` and read the body as text.
    pub async fn get(
        &self,
        path: &str,
        headers: &HeaderMap,
        query: &[(String, String)],
    ) -> Result<Page> {
        let url = self.url(path)?;
        tracing::debug!("GET {}", url);

        let request = self.client.get(url).headers(headers.clone()).query(query);
        read_page(self.send(request).await?).await
    }

    /// POST a url-encoded form to `path` and read the body as text.
    pub async fn post(
        &self,
        path: &str,
        headers: &HeaderMap,
        query: &[(String, String)],
        form: &[(String, String)],
    ) -> Result<Page> {
        let url = self.url(path)?;
        tracing::debug!("POST {}", url);

        let request = self
            .client
            .post(url)
            .headers(headers.clone())
            .query(query)
            .form(form);
        read_page(self.send(request).await?).await
    }

    /// Stream the body of `path` into `destination`. Returns bytes written.
    ///
    /// A partially written file is removed when the transfer fails.
    pub async fn download_binary(&self, path: &str, destination: &Path) -> Result<u64> {
        let url = self.url(path)?;
        tracing::debug!("GET {} -> {}", url, destination.display());

        let response = self.send(self.client.get(url)).await?;

        match stream_to_file(response, destination).await {
            Ok(written) => Ok(written),
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(destination).await {
                    if remove_err.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(
                            "Could not remove partial download {}: {}",
                            destination.display(),
                            remove_err
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// Send a request and turn non-2xx statuses into `HttpStatus` errors.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("Response status: {}", status);

        if !status.is_success() {
            let url = response.url().to_string();
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("Error body from {}: {}", url, snippet(&body));
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url,
                body,
            });
        }

        Ok(response)
    }
}

/// Headers sent with every request so the service sees a browser.
pub fn disguise_headers(endpoints: &EndpointsConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    headers.insert(header::USER_AGENT, header_value(&endpoints.user_agent)?);
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));

    for (name, value) in &endpoints.extra_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Config(format!("Invalid header name '{}': {}", name, e)))?;
        headers.insert(name, header_value(value)?);
    }

    Ok(headers)
}

/// Build a header value, reporting bad input as a configuration error.
pub fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::Config(format!("Invalid header value '{}': {}", value, e)))
}

fn build_client(endpoints: &EndpointsConfig, jar: Arc<Jar>, timeout: Duration) -> Result<Client> {
    Client::builder()
        .cookie_provider(jar)
        .default_headers(disguise_headers(endpoints)?)
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

async fn read_page(response: Response) -> Result<Page> {
    let status = response.status();
    let url = response.url().clone();
    let body = response.text().await?;
    Ok(Page { status, url, body })
}

async fn stream_to_file(response: Response, destination: &Path) -> Result<u64> {
    let mut file = File::create(destination)
        .await
        .map_err(|e| Error::filesystem(destination, e))?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::filesystem(destination, e))?;
        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| Error::filesystem(destination, e))?;

    Ok(written)
}

fn join_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let path = path.trim_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{}/{}", prefix, path),
    }
}

/// Truncate a body for logging.
pub(crate) fn snippet(body: &str) -> &str {
    match body.char_indices().nth(BODY_SNIPPET_LIMIT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> HttpSession {
        HttpSession::new(
            &EndpointsConfig::default(),
            "https://connect.example.com/",
            "/modern/",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_url_joins_prefix_and_path() {
        let session = session();
        assert_eq!(
            session.url("proxy/activity").unwrap().as_str(),
            "https://connect.example.com/modern/proxy/activity"
        );
        assert_eq!(
            session.url("").unwrap().as_str(),
            "https://connect.example.com/modern"
        );
    }

    #[test]
    fn test_inherit_extends_prefix_and_shares_jar() {
        let parent = session();
        let child = parent.inherit("proxy/download-service/files");
        assert_eq!(
            child.url("activity/7").unwrap().as_str(),
            "https://connect.example.com/modern/proxy/download-service/files/activity/7"
        );
        assert!(Arc::ptr_eq(&parent.cookie_jar(), &child.cookie_jar()));
    }

    #[test]
    fn test_sibling_changes_host_and_shares_jar() {
        let parent = session();
        let sso = parent.sibling("https://sso.example.com", "sso").unwrap();
        assert_eq!(
            sso.url("signin").unwrap().as_str(),
            "https://sso.example.com/sso/signin"
        );
        assert!(Arc::ptr_eq(&parent.cookie_jar(), &sso.cookie_jar()));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = HttpSession::new(
            &EndpointsConfig::default(),
            "not a url",
            "modern",
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(Error::UrlParse(_))));
    }

    #[test]
    fn test_disguise_headers_include_extras() {
        let headers = disguise_headers(&EndpointsConfig::default()).unwrap();
        assert!(headers.contains_key(header::USER_AGENT));
        assert_eq!(headers.get("NK").unwrap(), "NT");
    }

    #[test]
    fn test_bad_extra_header_is_config_error() {
        let mut endpoints = EndpointsConfig::default();
        endpoints
            .extra_headers
            .insert("bad header".to_string(), "x".to_string());
        assert!(matches!(disguise_headers(&endpoints), Err(Error::Config(_))));
    }

    #[test]
    fn test_snippet_truncates_long_bodies() {
        let body = "x".repeat(BODY_SNIPPET_LIMIT + 10);
        assert_eq!(snippet(&body).len(), BODY_SNIPPET_LIMIT);
        assert_eq!(snippet("short"), "short");
    }
}
