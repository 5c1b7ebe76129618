use thiserror::Error;

use super::models::CreateTaskRequest;
use crate::config::ApiLimits;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskRequestError {
    #[error("urls must contain at least one entry")]
    NoUrls,
    #[error("urls must contain at most {max} entries, got {count}")]
    TooManyUrls { count: usize, max: usize },
    #[error("url at index {index} is empty")]
    EmptyUrl { index: usize },
    #[error("url at index {index} exceeds {max} bytes")]
    UrlTooLong { index: usize, max: usize },
}

/// Shape checks only. Scheme and host problems are recorded per file by the
/// processor so the rest of the batch still runs.
pub fn validate_request(
    request: &CreateTaskRequest,
    limits: &ApiLimits,
) -> Result<(), TaskRequestError> {
    if request.urls.is_empty() {
        return Err(TaskRequestError::NoUrls);
    }

    if request.urls.len() > limits.max_urls_per_task {
        return Err(TaskRequestError::TooManyUrls {
            count: request.urls.len(),
            max: limits.max_urls_per_task,
        });
    }

    for (index, url) in request.urls.iter().enumerate() {
        if url.trim().is_empty() {
            return Err(TaskRequestError::EmptyUrl { index });
        }
        if url.len() > limits.max_url_bytes {
            return Err(TaskRequestError::UrlTooLong {
                index,
                max: limits.max_url_bytes,
            });
        }
    }

    Ok(())
}
