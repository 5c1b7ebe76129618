//! Startup pass that undoes the in-flight state left behind by a crash

use tracing::{debug, info};

use crate::ledger::{Result, TaskStore};
use crate::task::Task;

/// What a recovery pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Tasks rewritten in the store
    pub tasks_reset: usize,
    /// Downloading slots returned to pending
    pub files_reset: usize,
}

impl RecoveryReport {
    pub fn is_empty(&self) -> bool {
        self.tasks_reset == 0
    }
}

/// Reset one task's in-flight state and persist it if anything changed.
///
/// Returns the number of file slots reset, or `None` when the task was
/// already clean and nothing was written.
pub fn reset_task(store: &dyn TaskStore, task: &mut Task) -> Result<Option<usize>> {
    let Some(files) = task.reset_in_flight() else {
        return Ok(None);
    };
    store.save(task)?;
    debug!(task_id = %task.id, files, "Task reset to pending");
    Ok(Some(files))
}

/// Return every downloading file to pending, along with every task that was
/// in_progress or held such a file. Safe to run repeatedly.
pub fn recover_interrupted(store: &dyn TaskStore) -> Result<RecoveryReport> {
    let mut report = RecoveryReport::default();

    for mut task in store.list_all()? {
        if let Some(files) = reset_task(store, &mut task)? {
            report.tasks_reset += 1;
            report.files_reset += files;
        }
    }

    info!(
        tasks_reset = report.tasks_reset,
        files_reset = report.files_reset,
        "Recovery pass finished"
    );
    Ok(report)
}
