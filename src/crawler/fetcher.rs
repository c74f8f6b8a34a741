//! HTTP fetcher implementation
//!
//! This module handles all page requests for the harvester, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests with a strict per-call deadline
//! - Error classification into timeout / network / HTTP status failures
//!
//! Retries are not performed here; see `crawler::retry`.

use crate::config::UserAgentConfig;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum number of redirects followed for a single request
const MAX_REDIRECTS: usize = 10;

/// Errors that can occur while fetching a page
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("timed out after {}ms fetching {url}", .after.as_millis())]
    Timeout { url: String, after: Duration },

    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },
}

impl FetchError {
    /// Returns true if another attempt at the same URL may succeed
    ///
    /// | Condition | Retry |
    /// |-----------|-------|
    /// | Timeout | yes |
    /// | Network error | yes |
    /// | HTTP 5xx | yes |
    /// | HTTP 408 / 429 | yes |
    /// | Other HTTP status (404, 403, ...) | no |
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } => true,
            Self::HttpStatus { status, .. } => {
                *status >= 500
                    || *status == StatusCode::REQUEST_TIMEOUT.as_u16()
                    || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
        }
    }

    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Network { .. } => "network",
            Self::HttpStatus { .. } => "http_status",
        }
    }
}

/// Retrieves the HTML of a page
///
/// Implementations must honor `timeout` strictly: a call that exceeds it
/// returns [`FetchError::Timeout`] instead of blocking the caller. Calls are
/// independent of each other, so one fetcher may serve many tasks at once.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<String, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Example
///
/// ```no_run
/// use course_harvest::config::UserAgentConfig;
/// use course_harvest::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "course-harvest".to_string(),
///     crawler_version: "0.1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(config))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Format: CrawlerName/Version (+ContactURL; ContactEmail)
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// [`PageFetcher`] backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a fetcher with a client configured from `config`
    pub fn from_config(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }

    async fn get(&self, url: &Url, timeout: Duration) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_error(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| classify_error(url, timeout, e))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<String, FetchError> {
        tracing::trace!("GET {}", url);

        match tokio::time::timeout(timeout, self.get(url, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                after: timeout,
            }),
        }
    }
}

/// Maps a reqwest error onto the fetch error taxonomy
fn classify_error(url: &Url, timeout: Duration, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        return FetchError::Timeout {
            url: url.to_string(),
            after: timeout,
        };
    }

    if let Some(status) = error.status() {
        return FetchError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        };
    }

    let message = if error.is_connect() {
        "connection refused".to_string()
    } else if error.is_redirect() {
        format!("redirect limit of {} exceeded", MAX_REDIRECTS)
    } else {
        error.to_string()
    };

    FetchError::Network {
        url: url.to_string(),
        message,
    }
}
