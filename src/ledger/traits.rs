use uuid::Uuid;

use super::error::Result;
use crate::task::{Task, TaskStatus};

/// Durable keyed storage for task records
///
/// Every write replaces a whole record and is atomic per task; readers never
/// observe a half-written task. `claim` and `release` are compare-and-set
/// transitions and must be atomic with respect to every other write on the
/// same store.
pub trait TaskStore: Send + Sync {
    /// Persist a new pending task for the given URLs
    fn create(&self, urls: Vec<String>) -> Result<Task> {
        let task = Task::new(urls);
        self.save(&task)?;
        Ok(task)
    }

    fn get(&self, id: &Uuid) -> Result<Option<Task>>;

    /// Point-in-time snapshot of every stored task
    fn list_all(&self) -> Result<Vec<Task>>;

    /// Overwrite the stored record for `task.id`
    fn save(&self, task: &Task) -> Result<()>;

    /// Change only the status of an existing task
    fn update_status(&self, id: &Uuid, status: TaskStatus) -> Result<()>;

    /// Atomically move a task from pending to in_progress.
    ///
    /// Returns the claimed record, or `None` when the task is missing or no
    /// longer pending. Only one caller can win a given claim.
    fn claim(&self, id: &Uuid) -> Result<Option<Task>> {
        self.compare_and_set_status(id, TaskStatus::Pending, TaskStatus::InProgress)
    }

    /// Hand a claimed task back (in_progress -> pending)
    fn release(&self, id: &Uuid) -> Result<bool> {
        Ok(self
            .compare_and_set_status(id, TaskStatus::InProgress, TaskStatus::Pending)?
            .is_some())
    }

    /// Set `next` only if the stored status equals `expected`; returns the
    /// updated record when the swap happened
    fn compare_and_set_status(
        &self,
        id: &Uuid,
        expected: TaskStatus,
        next: TaskStatus,
    ) -> Result<Option<Task>>;

    /// Verify the backing storage is reachable
    fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn list_pending(&self) -> Result<Vec<Task>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(Task::is_pending)
            .collect())
    }
}
