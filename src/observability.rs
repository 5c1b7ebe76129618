//! Process-wide counters for the dispatch pipeline

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::worker::SubmitOutcome;

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_enqueued: AtomicU64,
    jobs_dropped: AtomicU64,
    jobs_rejected: AtomicU64,
    jobs_discarded: AtomicU64,
    tasks_claimed: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_recovered: AtomicU64,
    files_completed: AtomicU64,
    files_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backpressure hook: every pool submission lands here
    pub fn submission(&self, outcome: SubmitOutcome) {
        let counter = match outcome {
            SubmitOutcome::Enqueued => &self.jobs_enqueued,
            SubmitOutcome::Dropped => &self.jobs_dropped,
            SubmitOutcome::Rejected => &self.jobs_rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(outcome = outcome.as_str(), "Submission recorded");
    }

    /// Enqueued jobs that never ran because the pool stopped first
    pub fn jobs_discarded(&self, count: u64) {
        self.jobs_discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn task_claimed(&self) {
        self.tasks_claimed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_completed", "Metric incremented");
    }

    pub fn tasks_recovered(&self, count: u64) {
        self.tasks_recovered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn file_completed(&self) {
        self.files_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "files_failed", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_enqueued: self.jobs_enqueued.load(Ordering::Relaxed),
            jobs_dropped: self.jobs_dropped.load(Ordering::Relaxed),
            jobs_rejected: self.jobs_rejected.load(Ordering::Relaxed),
            jobs_discarded: self.jobs_discarded.load(Ordering::Relaxed),
            tasks_claimed: self.tasks_claimed.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_recovered: self.tasks_recovered.load(Ordering::Relaxed),
            files_completed: self.files_completed.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_enqueued: u64,
    pub jobs_dropped: u64,
    pub jobs_rejected: u64,
    pub jobs_discarded: u64,
    pub tasks_claimed: u64,
    pub tasks_completed: u64,
    pub tasks_recovered: u64,
    pub files_completed: u64,
    pub files_failed: u64,
}
