//! HTTP client for wishlist pages.

mod user_agent;

pub use user_agent::{resolve_user_agent, MOBILE_USER_AGENTS};

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

/// Errors from a single page request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Http(StatusCode),

    #[error("invalid request for {url}: {reason}")]
    InvalidRequest { url: String, reason: String },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::InvalidRequest { .. })
    }
}

/// Issues one GET for one page. Retries are layered on top by
/// [`crate::scrapers::PageFetcher`].
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch `url` once, returning the body of a 200 response.
    async fn get_page(&self, url: &str, user_agent: &str) -> Result<String, FetchError>;
}

/// reqwest-backed page source with a shared cookie store.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    referer: String,
}

impl HttpClient {
    /// Create a client for a site, sending `origin/` as the Referer.
    pub fn new(origin: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            referer: format!("{}/", origin.trim_end_matches('/')),
        })
    }

    /// Browser-like headers sent with every page request.
    fn request_headers(&self, url: &str, user_agent: &str) -> Result<HeaderMap, FetchError> {
        let invalid = |reason: String| FetchError::InvalidRequest {
            url: url.to_string(),
            reason,
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|e| invalid(e.to_string()))?,
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(
            REFERER,
            HeaderValue::from_str(&self.referer).map_err(|e| invalid(e.to_string()))?,
        );
        Ok(headers)
    }
}

#[async_trait]
impl PageSource for HttpClient {
    async fn get_page(&self, url: &str, user_agent: &str) -> Result<String, FetchError> {
        let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidRequest {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let headers = self.request_headers(url, user_agent)?;

        let start = Instant::now();
        let response = self.client.get(parsed).headers(headers).send().await?;
        let status = response.status();
        debug!(
            "GET {} -> {} in {}ms",
            url,
            status.as_u16(),
            start.elapsed().as_millis()
        );

        if status != StatusCode::OK {
            return Err(FetchError::Http(status));
        }

        Ok(response.text().await?)
    }
}
