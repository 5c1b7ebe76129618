//! Polls the ledger for pending tasks and hands them to the worker pool
//!
//! Lifecycle: `Stopped -> Starting -> Running -> Stopping -> Stopped`.
//!
//! Every tick lists pending tasks, claims each one in the store and only
//! then submits a processor job. A claim whose job the pool did not accept
//! is released again, so the task is picked up by a later tick.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::pool::{SubmitOutcome, WorkerPool};
use super::processor::TaskProcessor;
use super::recovery::{self, RecoveryReport};
use crate::config::DispatcherConfig;
use crate::ledger::{StoreError, TaskStore};
use crate::observability::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for DispatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DispatcherState::Stopped => "stopped",
            DispatcherState::Starting => "starting",
            DispatcherState::Running => "running",
            DispatcherState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("Dispatcher cannot start while {0}")]
    InvalidState(DispatcherState),

    #[error("Worker pool has been shut down; create a new dispatcher")]
    PoolStopped,

    #[error("Recovery failed: {0}")]
    Recovery(#[source] StoreError),
}

pub type Result<T> = std::result::Result<T, DispatcherError>;

/// Counts from a single poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub pending: usize,
    pub dispatched: usize,
    /// Claimed by someone else between list and claim
    pub skipped: usize,
    /// Claimed but not accepted by the pool, then released
    pub released: usize,
}

struct Inner {
    store: Arc<dyn TaskStore>,
    processor: Arc<TaskProcessor>,
    pool: WorkerPool,
    metrics: Arc<Metrics>,
}

pub struct Dispatcher {
    inner: Arc<Inner>,
    poll_interval: Duration,
    state: Mutex<DispatcherState>,
    ticker: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl Dispatcher {
    /// Build a dispatcher and its worker pool. Must be called from within a
    /// tokio runtime.
    pub fn new(
        store: Arc<dyn TaskStore>,
        processor: Arc<TaskProcessor>,
        config: &DispatcherConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        let pool = WorkerPool::new(config.max_workers, config.queue_capacity, metrics.clone());

        Self {
            inner: Arc::new(Inner {
                store,
                processor,
                pool,
                metrics,
            }),
            poll_interval: config.poll_interval.as_duration(),
            state: Mutex::new(DispatcherState::Stopped),
            ticker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> DispatcherState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: DispatcherState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = *state;
        debug!(from = %previous, to = %next, "Dispatcher state change");
        *state = next;
    }

    /// Run the recovery pass, then start polling every `poll_interval`.
    ///
    /// The first tick fires immediately after recovery.
    pub fn start(&self) -> Result<RecoveryReport> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != DispatcherState::Stopped {
                return Err(DispatcherError::InvalidState(*state));
            }
            if self.inner.pool.is_stopped() {
                return Err(DispatcherError::PoolStopped);
            }
            *state = DispatcherState::Starting;
        }

        info!(poll_interval = ?self.poll_interval, "Starting dispatcher");

        let report = match recovery::recover_interrupted(self.inner.store.as_ref()) {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Recovery pass failed");
                self.set_state(DispatcherState::Stopped);
                return Err(DispatcherError::Recovery(e));
            }
        };
        self.inner.metrics.tasks_recovered(report.tasks_reset as u64);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            self.inner.clone(),
            self.poll_interval,
            shutdown_rx,
        ));
        *self.ticker.lock().unwrap_or_else(PoisonError::into_inner) = Some((shutdown_tx, handle));

        self.set_state(DispatcherState::Running);
        info!("Dispatcher running");
        Ok(report)
    }

    /// Poll once. Exposed so callers can drive the dispatcher by hand.
    pub fn tick(&self) -> TickReport {
        self.inner.tick()
    }

    /// Stop polling, wait for an in-progress tick, then stop the pool.
    ///
    /// Running processor jobs are allowed to finish. Calling this when the
    /// dispatcher is not running logs and returns.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let current = *state;
            if current != DispatcherState::Running {
                warn!(state = %current, "Dispatcher is not running");
                return;
            }
            *state = DispatcherState::Stopping;
        }

        info!("Stopping dispatcher");

        let ticker = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((shutdown_tx, handle)) = ticker {
            let _ = shutdown_tx.send(true);
            if let Err(e) = handle.await {
                error!(error = %e, "Dispatcher loop terminated abnormally");
            }
        }

        self.inner.pool.stop().await;

        self.set_state(DispatcherState::Stopped);
        info!("Dispatcher stopped");
    }

    /// Jobs waiting in the pool queue
    pub fn queue_len(&self) -> usize {
        self.inner.pool.queue_len()
    }

    /// Whether the next submission would find a free queue slot
    pub fn has_capacity(&self) -> bool {
        self.inner.pool.has_capacity()
    }
}

impl Inner {
    fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        let pending = match self.store.list_pending() {
            Ok(pending) => pending,
            Err(e) => {
                error!(error = %e, "Failed to list pending tasks");
                return report;
            }
        };

        report.pending = pending.len();
        if pending.is_empty() {
            return report;
        }
        debug!(pending = report.pending, "Found pending tasks");

        for candidate in pending {
            let task = match self.store.claim(&candidate.id) {
                Ok(Some(task)) => task,
                Ok(None) => {
                    debug!(task_id = %candidate.id, "Task already claimed");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    error!(task_id = %candidate.id, error = %e, "Failed to claim task");
                    return report;
                }
            };
            self.metrics.task_claimed();

            let task_id = task.id;
            let processor = self.processor.clone();
            let outcome = self.pool.submit(async move {
                if let Err(e) = processor.process(task).await {
                    error!(%task_id, error = %e, "Task processing aborted");
                }
            });

            match outcome {
                SubmitOutcome::Enqueued => {
                    debug!(%task_id, "Task dispatched");
                    report.dispatched += 1;
                }
                SubmitOutcome::Dropped | SubmitOutcome::Rejected => {
                    report.released += 1;
                    match self.store.release(&task_id) {
                        Ok(true) => {
                            debug!(%task_id, outcome = outcome.as_str(), "Claim released")
                        }
                        Ok(false) => {
                            warn!(%task_id, "Claim vanished before release")
                        }
                        Err(e) => {
                            // Recovery on the next start returns it to pending
                            error!(%task_id, error = %e, "Failed to release claim");
                        }
                    }
                }
            }
        }

        info!(
            pending = report.pending,
            dispatched = report.dispatched,
            released = report.released,
            "Dispatch tick"
        );
        report
    }
}

async fn run_loop(inner: Arc<Inner>, poll_interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                inner.tick();
            }
        }
    }

    debug!("Dispatcher loop exited");
}
