use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "TASKFETCH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/taskfetch.toml";
const ENV_PREFIX: &str = "TASKFETCH";
const ENV_SEPARATOR: &str = "__";

/// Plain variable names used by earlier deployments of the service
const LEGACY_STORAGE_PATH: &str = "STORAGEPATH";
const LEGACY_MAX_WORKERS: &str = "MAXWORKERS";
const LEGACY_PORT: &str = "PORT";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load(path: Option<PathBuf>) -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = path.unwrap_or_else(|| {
        env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    });

    let mut config = load_from_sources(config_path)?;
    apply_legacy_env(&mut config, |key| env::var(key).ok())?;

    Ok(config)
}

/// Honour the unprefixed variables when the prefixed form is not set
fn apply_legacy_env<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let prefixed = |section: &str, key: &str| {
        lookup(&format!(
            "{ENV_PREFIX}{ENV_SEPARATOR}{}{ENV_SEPARATOR}{}",
            section.to_uppercase(),
            key.to_uppercase()
        ))
        .is_some()
    };

    if let Some(root) = lookup(LEGACY_STORAGE_PATH) {
        if !prefixed("storage", "root") {
            config.storage.root = PathBuf::from(root);
        }
    }

    if let Some(workers) = lookup(LEGACY_MAX_WORKERS) {
        if !prefixed("dispatcher", "max_workers") {
            config.dispatcher.max_workers = workers.trim().parse().map_err(|_| {
                ConfigError::Message(format!("{LEGACY_MAX_WORKERS} must be an integer, got '{workers}'"))
            })?;
        }
    }

    if let Some(port) = lookup(LEGACY_PORT) {
        if !prefixed("server", "bind_addr") {
            let port: u16 = port.trim().parse().map_err(|_| {
                ConfigError::Message(format!("{LEGACY_PORT} must be a port number, got '{port}'"))
            })?;
            config.server.bind_addr.set_port(port);
        }
    }

    Ok(())
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    // Start with defaults (handled by struct Default implementations)
    // Add TOML file if it exists (optional)
    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // TASKFETCH__DISPATCHER__POLL_INTERVAL -> dispatcher.poll_interval
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.dispatcher.max_workers, 4);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"

[storage]
root = "/var/lib/taskfetch"

[dispatcher]
poll_interval = "2s"
max_workers = 16
queue_capacity = 10

[fetch]
request_timeout = "45m"
max_attempts = 3
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.storage.root, PathBuf::from("/var/lib/taskfetch"));
        assert_eq!(config.dispatcher.poll_interval.0, Duration::from_secs(2));
        assert_eq!(config.dispatcher.max_workers, 16);
        assert_eq!(config.dispatcher.queue_capacity, 10);
        assert_eq!(config.fetch.request_timeout.0, Duration::from_secs(45 * 60));
        assert_eq!(config.fetch.max_attempts, 3);
    }

    #[test]
    fn test_legacy_env_aliases() {
        let mut config = Config::default();
        let lookup = lookup_from(&[
            ("STORAGEPATH", "/data"),
            ("MAXWORKERS", "12"),
            ("PORT", "9090"),
        ]);

        apply_legacy_env(&mut config, lookup).unwrap();

        assert_eq!(config.storage.root, PathBuf::from("/data"));
        assert_eq!(config.dispatcher.max_workers, 12);
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:9090");
    }

    #[test]
    fn test_prefixed_env_wins_over_legacy() {
        let mut config = Config::default();
        config.dispatcher.max_workers = 2;
        let lookup = lookup_from(&[
            ("MAXWORKERS", "12"),
            ("TASKFETCH__DISPATCHER__MAX_WORKERS", "2"),
        ]);

        apply_legacy_env(&mut config, lookup).unwrap();
        assert_eq!(config.dispatcher.max_workers, 2);
    }

    #[test]
    fn test_legacy_env_rejects_garbage() {
        let mut config = Config::default();
        let result = apply_legacy_env(&mut config, lookup_from(&[("PORT", "http")]));
        assert!(result.is_err());
    }
}
