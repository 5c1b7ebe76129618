use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{Result, StoreError};
use super::partitions::{TASK_KEY_PREFIX, decode_task_key, encode_task_key};
use super::traits::TaskStore;
use crate::task::{Task, TaskStatus};

/// Fjall-backed persistent storage for task records
#[derive(Clone)]
pub struct FjallStore {
    keyspace: Keyspace,
    tasks: PartitionHandle,
    /// Serializes writers so read-modify-write transitions are atomic
    write_lock: Arc<Mutex<()>>,
}

impl FjallStore {
    /// Open or create a Fjall store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening Fjall store at: {}", path.display());

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let tasks = keyspace.open_partition("tasks", PartitionCreateOptions::default())?;

        info!("Fjall store opened successfully");
        Ok(Self {
            keyspace,
            tasks,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| StoreError::Poisoned)
    }

    fn read(&self, id: &Uuid) -> Result<Option<Task>> {
        match self.tasks.get(encode_task_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn write(&self, task: &Task) -> Result<()> {
        let key = encode_task_key(&task.id);
        let value = serde_json::to_vec(task)?;
        self.tasks.insert(key, value)?;
        debug!(task_id = %task.id, status = %task.status, "Stored task");
        Ok(())
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

}

impl TaskStore for FjallStore {
    fn get(&self, id: &Uuid) -> Result<Option<Task>> {
        self.read(id)
    }

    fn list_all(&self) -> Result<Vec<Task>> {
        let mut tasks = Vec::new();

        for item in self.tasks.prefix(TASK_KEY_PREFIX) {
            let (key, value) = item?;
            match serde_json::from_slice::<Task>(&value) {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    // A single corrupt record must not hide the rest
                    warn!(
                        key = ?decode_task_key(&key),
                        error = %e,
                        "Skipping unreadable task record"
                    );
                }
            }
        }

        Ok(tasks)
    }

    fn save(&self, task: &Task) -> Result<()> {
        let _guard = self.lock()?;
        self.write(task)
    }

    fn update_status(&self, id: &Uuid, status: TaskStatus) -> Result<()> {
        let _guard = self.lock()?;
        let mut task = self.read(id)?.ok_or(StoreError::TaskNotFound(*id))?;
        task.status = status;
        self.write(&task)
    }

    fn compare_and_set_status(
        &self,
        id: &Uuid,
        expected: TaskStatus,
        next: TaskStatus,
    ) -> Result<Option<Task>> {
        let _guard = self.lock()?;
        let Some(mut task) = self.read(id)? else {
            return Ok(None);
        };
        if task.status != expected {
            return Ok(None);
        }
        task.status = next;
        self.write(&task)?;
        Ok(Some(task))
    }

    fn health_check(&self) -> Result<()> {
        let _ = self.tasks.first_key_value()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::FileStatus;
    use tempfile::TempDir;

    fn create_test_store() -> (FjallStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallStore::open(temp_dir.path().join("test_ledger")).unwrap();
        (store, temp_dir)
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_create_and_get_task() {
        let (store, _temp) = create_test_store();
        let task = store
            .create(urls(&["http://x/a.png", "http://x/b.png"]))
            .unwrap();

        let retrieved = store.get(&task.id).unwrap().unwrap();
        assert_eq!(retrieved, task);
        assert_eq!(retrieved.status, TaskStatus::Pending);
        assert_eq!(retrieved.urls[1].url, "http://x/b.png");
    }

    #[test]
    fn test_get_nonexistent_task() {
        let (store, _temp) = create_test_store();
        assert!(store.get(&Uuid::now_v7()).unwrap().is_none());
    }

    #[test]
    fn test_list_all_and_pending() {
        let (store, _temp) = create_test_store();
        let a = store.create(urls(&["http://x/a"])).unwrap();
        let b = store.create(urls(&["http://x/b"])).unwrap();
        store.update_status(&b.id, TaskStatus::Completed).unwrap();

        assert_eq!(store.list_all().unwrap().len(), 2);
        let pending = store.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a.id);
    }

    #[test]
    fn test_update_status_missing_task() {
        let (store, _temp) = create_test_store();
        let result = store.update_status(&Uuid::now_v7(), TaskStatus::Completed);
        assert!(matches!(result, Err(StoreError::TaskNotFound(_))));
    }

    #[test]
    fn test_claim_is_exclusive() {
        let (store, _temp) = create_test_store();
        let task = store.create(urls(&["http://x/a"])).unwrap();

        let claimed = store.claim(&task.id).unwrap().unwrap();
        assert_eq!(claimed.status, TaskStatus::InProgress);
        assert_eq!(claimed.urls, task.urls);
        assert!(store.claim(&task.id).unwrap().is_none());
        assert_eq!(
            store.get(&task.id).unwrap().unwrap().status,
            TaskStatus::InProgress
        );

        assert!(store.release(&task.id).unwrap());
        assert!(!store.release(&task.id).unwrap());
        assert!(store.claim(&task.id).unwrap().is_some());
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let (store, _temp) = create_test_store();
        let task = store.create(urls(&["http://x/a"])).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let id = task.id;
                std::thread::spawn(move || store.claim(&id).unwrap().is_some())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_persistence_across_reopens() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger");

        let id = {
            let store = FjallStore::open(&path).unwrap();
            let mut task = store.create(urls(&["http://x/a"])).unwrap();
            task.urls[0].mark_downloading();
            store.save(&task).unwrap();
            store.persist().unwrap();
            task.id
        };

        let store = FjallStore::open(&path).unwrap();
        let task = store.get(&id).unwrap().unwrap();
        assert_eq!(task.urls[0].status, FileStatus::Downloading);
    }
}
