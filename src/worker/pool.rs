//! Fixed-size worker pool fed by a bounded job queue
//!
//! `submit` never waits: a full queue drops the job and a stopped pool
//! rejects it. Callers learn which happened through [`SubmitOutcome`].
//!
//! Once `stop` begins, every later submission is rejected. Jobs that were
//! already queued at that point never run; they are counted as discarded.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::observability::Metrics;

pub const DEFAULT_MAX_WORKERS: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Unit of work executed by a pool worker
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Result of a non-blocking submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Queued; runs exactly once unless the pool stops before a worker
    /// picks it up
    Enqueued,
    /// Queue was full; the job was discarded
    Dropped,
    /// Pool is stopped; the job was discarded
    Rejected,
}

impl SubmitOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitOutcome::Enqueued => "enqueued",
            SubmitOutcome::Dropped => "dropped",
            SubmitOutcome::Rejected => "rejected",
        }
    }
}

pub struct WorkerPool {
    sender: mpsc::Sender<Job>,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    shutdown: watch::Sender<bool>,
    workers: std::sync::Mutex<Vec<JoinHandle<()>>>,
    // Held for reading across the check and the send in `submit`, so no
    // job can enter the queue after `stop` flips it
    stopped: RwLock<bool>,
    max_workers: usize,
    capacity: usize,
    metrics: Arc<Metrics>,
}

impl WorkerPool {
    /// Spawn `max_workers` workers sharing a queue of `queue_capacity` slots.
    ///
    /// Zero for either value selects the default. Must be called from within
    /// a tokio runtime.
    pub fn new(max_workers: usize, queue_capacity: usize, metrics: Arc<Metrics>) -> Self {
        let max_workers = if max_workers == 0 {
            DEFAULT_MAX_WORKERS
        } else {
            max_workers
        };
        let capacity = if queue_capacity == 0 {
            DEFAULT_QUEUE_CAPACITY
        } else {
            queue_capacity
        };

        info!(max_workers, capacity, "Starting worker pool");

        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let (shutdown, _) = watch::channel(false);

        let workers = (0..max_workers)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    receiver.clone(),
                    shutdown.subscribe(),
                ))
            })
            .collect();

        Self {
            sender,
            receiver,
            shutdown,
            workers: std::sync::Mutex::new(workers),
            stopped: RwLock::new(false),
            max_workers,
            capacity,
            metrics,
        }
    }

    /// Offer a job to the queue without waiting
    pub fn submit<F>(&self, job: F) -> SubmitOutcome
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let outcome = {
            let stopped = self.stopped.read().unwrap_or_else(PoisonError::into_inner);
            if *stopped {
                SubmitOutcome::Rejected
            } else {
                match self.sender.try_send(Box::pin(job)) {
                    Ok(()) => SubmitOutcome::Enqueued,
                    Err(TrySendError::Full(_)) => SubmitOutcome::Dropped,
                    Err(TrySendError::Closed(_)) => SubmitOutcome::Rejected,
                }
            }
        };

        match outcome {
            SubmitOutcome::Enqueued => debug!(queue_len = self.queue_len(), "Job enqueued"),
            SubmitOutcome::Dropped => warn!(capacity = self.capacity, "Job queue full, job dropped"),
            SubmitOutcome::Rejected => warn!("Worker pool stopped, job rejected"),
        }
        self.metrics.submission(outcome);

        outcome
    }

    /// Let every worker finish its current job, wait for all of them, then
    /// close the queue.
    ///
    /// Submissions made after this call begins are rejected. Jobs still
    /// queued never run; their count is returned and recorded as
    /// discarded. A second call does nothing and returns zero.
    pub async fn stop(&self) -> usize {
        {
            let mut stopped = self.stopped.write().unwrap_or_else(PoisonError::into_inner);
            if *stopped {
                warn!("Worker pool already stopped");
                return 0;
            }
            *stopped = true;
        }

        info!(workers = self.max_workers, "Stopping worker pool");
        let _ = self.shutdown.send(true);

        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker terminated abnormally");
            }
        }

        let mut receiver = self.receiver.lock().await;
        receiver.close();
        let mut discarded = 0usize;
        while receiver.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            warn!(discarded, "Discarded queued jobs at shutdown");
            self.metrics.jobs_discarded(discarded as u64);
        }

        info!("Worker pool stopped");
        discarded
    }

    /// Jobs waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn has_capacity(&self) -> bool {
        self.sender.capacity() > 0
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(worker_id, "Worker started");

    loop {
        let stopping = *shutdown.borrow();
        if stopping {
            break;
        }

        let job = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            job = async { receiver.lock().await.recv().await } => job,
        };

        let Some(job) = job else {
            debug!(worker_id, "Job queue closed");
            break;
        };

        // A panic inside the job surfaces as a JoinError here
        if let Err(e) = tokio::spawn(job).await {
            error!(worker_id, error = %e, "Job panicked");
        }
    }

    debug!(worker_id, "Worker exiting");
}
