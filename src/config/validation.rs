use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("dispatcher.queue_capacity must be greater than zero")]
    ZeroQueueCapacity,

    #[error("fetch.max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("server.api.{field} must be greater than zero")]
    ZeroApiLimit { field: &'static str },

    #[error("fetch.user_agent must not be empty")]
    EmptyUserAgent,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_dispatcher(config)?;
    validate_fetch(config)?;
    validate_api(config)?;
    Ok(())
}

fn validate_dispatcher(config: &Config) -> Result<(), ValidationError> {
    if config.dispatcher.poll_interval.is_zero() {
        return Err(ValidationError::ZeroDuration {
            field: "dispatcher.poll_interval",
        });
    }

    if config.dispatcher.queue_capacity == 0 {
        return Err(ValidationError::ZeroQueueCapacity);
    }

    Ok(())
}

fn validate_fetch(config: &Config) -> Result<(), ValidationError> {
    if config.fetch.connect_timeout.is_zero() {
        return Err(ValidationError::ZeroDuration {
            field: "fetch.connect_timeout",
        });
    }

    if config.fetch.request_timeout.is_zero() {
        return Err(ValidationError::ZeroDuration {
            field: "fetch.request_timeout",
        });
    }

    if config.fetch.max_attempts == 0 {
        return Err(ValidationError::ZeroAttempts);
    }

    if config.fetch.user_agent.trim().is_empty() {
        return Err(ValidationError::EmptyUserAgent);
    }

    Ok(())
}

fn validate_api(config: &Config) -> Result<(), ValidationError> {
    if config.server.api.max_urls_per_task == 0 {
        return Err(ValidationError::ZeroApiLimit {
            field: "max_urls_per_task",
        });
    }

    if config.server.api.max_url_bytes == 0 {
        return Err(ValidationError::ZeroApiLimit {
            field: "max_url_bytes",
        });
    }

    Ok(())
}
