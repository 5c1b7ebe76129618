//! Task execution: polling, claiming, pooled workers and per-file downloads
//!
//! ```text
//! Dispatcher ──tick──> TaskStore::claim ──> WorkerPool::submit ──> TaskProcessor
//!                                                                      │
//!                                                        Fetcher (one file at a time)
//! ```
//!
//! The ledger is the only shared state; a task is owned by at most one
//! processor run between a successful claim and its final save.

pub mod dispatcher;
pub mod http;
pub mod pool;
pub mod processor;
pub mod recovery;

pub use dispatcher::{Dispatcher, DispatcherError, DispatcherState, TickReport};
pub use http::{FetchError, Fetcher, HttpFetcher};
pub use pool::{Job, SubmitOutcome, WorkerPool};
pub use processor::TaskProcessor;
pub use recovery::{RecoveryReport, recover_interrupted};
