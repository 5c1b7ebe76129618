//! Request and response bodies for the task API.
//!
//! ```json
//! POST /tasks
//! { "urls": ["https://cdn.example.com/a.png", "https://cdn.example.com/b.zip"] }
//!
//! 200 OK
//! { "task_id": "0190f1c2-7d4e-7b9a-9c1f-3a2b1c0d9e8f", "status": "pending" }
//! ```
//!
//! `GET /tasks/{id}` returns the stored [`Task`](crate::task::Task) record as is.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::observability::MetricsSnapshot;
use crate::task::TaskStatus;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CreateTaskRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateTaskResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IndexResponse {
    pub message: String,
    pub version: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
}

/// Counters plus live queue gauges when a dispatcher is attached
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueueGauges>,
}

#[derive(Debug, Serialize)]
pub struct QueueGauges {
    pub queue_len: usize,
    pub has_capacity: bool,
}
