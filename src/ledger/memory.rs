use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::error::{Result, StoreError};
use super::traits::TaskStore;
use crate::task::{Task, TaskStatus};

/// In-process task store for tests and ephemeral runs
///
/// Records are kept whole behind one mutex, so every operation is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: Mutex<BTreeMap<Uuid, Task>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<Uuid, Task>>> {
        self.tasks.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl TaskStore for MemoryStore {
    fn get(&self, id: &Uuid) -> Result<Option<Task>> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn list_all(&self) -> Result<Vec<Task>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn save(&self, task: &Task) -> Result<()> {
        self.lock()?.insert(task.id, task.clone());
        Ok(())
    }

    fn update_status(&self, id: &Uuid, status: TaskStatus) -> Result<()> {
        let mut tasks = self.lock()?;
        let task = tasks.get_mut(id).ok_or(StoreError::TaskNotFound(*id))?;
        task.status = status;
        Ok(())
    }

    fn compare_and_set_status(
        &self,
        id: &Uuid,
        expected: TaskStatus,
        next: TaskStatus,
    ) -> Result<Option<Task>> {
        let mut tasks = self.lock()?;
        match tasks.get_mut(id) {
            Some(task) if task.status == expected => {
                task.status = next;
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_release_cycle() {
        let store = MemoryStore::new();
        let task = store.create(vec!["http://x/a".to_string()]).unwrap();

        assert!(store.claim(&task.id).unwrap().is_some());
        assert!(store.claim(&task.id).unwrap().is_none());
        assert!(store.release(&task.id).unwrap());
        assert_eq!(store.list_pending().unwrap().len(), 1);
    }

    #[test]
    fn test_claim_unknown_task() {
        let store = MemoryStore::new();
        assert!(store.claim(&Uuid::now_v7()).unwrap().is_none());
        assert!(matches!(
            store.update_status(&Uuid::now_v7(), TaskStatus::Error),
            Err(StoreError::TaskNotFound(_))
        ));
    }
}
