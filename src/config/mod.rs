//! Configuration management for taskfetch
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! The resulting [`Config`] is built once at startup and handed to the store,
//! fetcher, worker pool and dispatcher constructors. Nothing reads it globally.
//!
//! # Usage
//!
//! ```no_run
//! use taskfetch::config::Config;
//!
//! let config = Config::load(None).expect("Failed to load configuration");
//! println!("Polling every {}", config.dispatcher.poll_interval);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `TASKFETCH__<section>__<key>`
//!
//! Examples:
//! - `TASKFETCH__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `TASKFETCH__DISPATCHER__POLL_INTERVAL=2s`
//! - `TASKFETCH__FETCH__REQUEST_TIMEOUT=45m`
//!
//! `STORAGEPATH`, `MAXWORKERS` and `PORT` are accepted as shorthands for
//! `storage.root`, `dispatcher.max_workers` and the bind port.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/taskfetch.toml`.
//! This can be overridden using the `TASKFETCH_CONFIG` environment variable
//! or the `--config` flag.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{ApiLimits, Config, DispatcherConfig, FetchConfig, ServerConfig, StorageConfig};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// `path` overrides `TASKFETCH_CONFIG` and the default file location.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or validation fails.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, ignoring `.env` and the
    /// unprefixed legacy variables
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
