//! HTTP fetcher: one URL streamed into one local file

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::FetchConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("HTTP {}: {}", .0.as_u16(), .0.canonical_reason().unwrap_or("Unknown"))]
    BadStatus(StatusCode),

    #[error("Failed to write file: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::RequestFailed(_) | FetchError::Timeout => true,
            FetchError::BadStatus(status) => status.is_server_error(),
            FetchError::InvalidUrl(_) | FetchError::TooManyRedirects | FetchError::Io(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Performs a single URL -> file download
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `url` into `dest`, returning the number of bytes written
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Accept only absolute http/https URLs with a host
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(FetchError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            parsed.scheme()
        )));
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(FetchError::InvalidUrl(format!("{url}: missing host")));
    }

    Ok(parsed)
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    client: Client,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout.as_duration())
            .timeout(config.request_timeout.as_duration())
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            max_attempts: config.max_attempts.max(1),
            retry_backoff: config.retry_backoff.as_duration(),
        })
    }

    /// Download once (no retry)
    async fn fetch_once(&self, url: &str, dest: &Path) -> Result<u64> {
        debug!(url, dest = %dest.display(), "Starting download");

        let mut response = self.client.get(url).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus(status));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;

        while let Some(chunk) = response.chunk().await.map_err(map_reqwest_error)? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(url, size = written, "Download completed");
        Ok(written)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.fetch_once(url, dest).await {
                Ok(size) => {
                    if attempts > 1 {
                        debug!(url, attempts, "Download succeeded after retry");
                    }
                    return Ok(size);
                }
                Err(e) => {
                    // Never leave a truncated file behind
                    let _ = tokio::fs::remove_file(dest).await;

                    if attempts >= self.max_attempts || !e.is_retryable() {
                        return Err(e);
                    }

                    warn!(url, attempts, error = %e, "Download failed, retrying");

                    // Exponential backoff: base, 2x base, 4x base, ...
                    let backoff = self
                        .retry_backoff
                        .saturating_mul(2u32.saturating_pow(attempts - 1));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_redirect() {
        FetchError::TooManyRedirects
    } else {
        FetchError::RequestFailed(e.to_string())
    }
}
