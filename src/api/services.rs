use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    error::ApiError,
    models::{
        CreateTaskRequest, CreateTaskResponse, HealthResponse, IndexResponse, MetricsResponse,
        QueueGauges,
    },
    state::AppState,
    validation::{TaskRequestError, validate_request},
};
use crate::worker::DispatcherState;

/// Service banner (GET /)
pub async fn index() -> impl IntoResponse {
    Json(IndexResponse {
        message: "taskfetch download service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
    })
}

/// Task submission endpoint (POST /tasks)
///
/// Persists a new pending task; the dispatcher picks it up on its next poll.
/// The body is parsed by hand so every malformed payload maps to a 400 with
/// the usual error envelope.
pub async fn create_task(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: CreateTaskRequest = serde_json::from_slice(&body)?;
    validate_request(&request, &state.config.server.api).map_err(map_request_error)?;

    let task = state.store.create(request.urls)?;
    info!(task_id = %task.id, files = task.urls.len(), "Task created");

    Ok((
        StatusCode::OK,
        Json(CreateTaskResponse {
            task_id: task.id,
            status: task.status,
        }),
    ))
}

fn map_request_error(err: TaskRequestError) -> ApiError {
    ApiError::InvalidPayload(err.to_string())
}

/// Task status endpoint (GET /tasks/{task_id})
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // An id that does not parse cannot exist
    let id = Uuid::parse_str(&task_id)
        .map_err(|_| ApiError::NotFound(format!("task {task_id}")))?;

    let task = state
        .store
        .get(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id}")))?;

    Ok((StatusCode::OK, Json(task)))
}

/// Health check endpoint (GET /health)
///
/// Returns 503 when the ledger is unreachable or the dispatcher is not
/// running.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = HashMap::new();
    components.insert("api".to_string(), "healthy".to_string());

    let ledger = match state.store.health_check() {
        Ok(()) => "healthy".to_string(),
        Err(e) => {
            warn!(error = %e, "Ledger health check failed");
            "unhealthy".to_string()
        }
    };
    components.insert("ledger".to_string(), ledger);

    if let Some(dispatcher) = &state.dispatcher {
        let status = match dispatcher.state() {
            DispatcherState::Running => "healthy",
            DispatcherState::Starting | DispatcherState::Stopping | DispatcherState::Stopped => {
                "unhealthy"
            }
        };
        components.insert("dispatcher".to_string(), status.to_string());
    }

    let all_healthy = components.values().all(|status| status == "healthy");
    let (overall_status, status_code) = if all_healthy {
        ("healthy", StatusCode::OK)
    } else {
        ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
    };

    let response = HealthResponse {
        status: overall_status.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}

/// Pipeline counters and queue depth (GET /metrics)
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let queue = state.dispatcher.as_ref().map(|dispatcher| QueueGauges {
        queue_len: dispatcher.queue_len(),
        has_capacity: dispatcher.has_capacity(),
    });

    Json(MetricsResponse {
        counters: state.metrics.snapshot(),
        queue,
    })
}
