use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub api: ApiLimits,
}

/// Limits applied to task submissions
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiLimits {
    #[serde(default = "default_max_urls_per_task")]
    pub max_urls_per_task: usize,
    #[serde(default = "default_max_url_bytes")]
    pub max_url_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            api: ApiLimits::default(),
        }
    }
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            max_urls_per_task: default_max_urls_per_task(),
            max_url_bytes: default_max_url_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_max_urls_per_task() -> usize {
    1000
}

fn default_max_url_bytes() -> usize {
    2048
}

/// Local storage layout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory for the task ledger and downloaded files
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl StorageConfig {
    pub fn ledger_path(&self) -> PathBuf {
        self.root.join("ledger")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join("downloads")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("storage")
}

/// Dispatcher and worker pool tunables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: HumanDuration,
    /// Zero falls back to the pool default
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            max_workers: default_max_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_poll_interval() -> HumanDuration {
    HumanDuration::from_secs(5)
}

fn default_max_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    100
}

/// HTTP fetcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
    /// Upper bound for one whole download
    #[serde(default = "default_request_timeout")]
    pub request_timeout: HumanDuration,
    /// Attempts per file; 1 disables retries
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: HumanDuration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            max_attempts: default_max_attempts(),
            retry_backoff: default_retry_backoff(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_connect_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

fn default_request_timeout() -> HumanDuration {
    HumanDuration::from_secs(30 * 60)
}

fn default_max_attempts() -> u32 {
    1
}

fn default_retry_backoff() -> HumanDuration {
    HumanDuration::from_secs(1)
}

fn default_user_agent() -> String {
    format!("taskfetch/{}", env!("CARGO_PKG_VERSION"))
}
