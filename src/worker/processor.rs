//! Runs one claimed task to completion, file by file

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Url;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::http::{self, Fetcher};
use crate::ledger::{StoreError, TaskStore};
use crate::observability::Metrics;
use crate::task::{Task, TaskStatus};

/// Name used when a URL has no usable last path segment
pub const FALLBACK_FILE_NAME: &str = "file";

pub struct TaskProcessor {
    store: Arc<dyn TaskStore>,
    fetcher: Arc<dyn Fetcher>,
    downloads_dir: PathBuf,
    metrics: Arc<Metrics>,
}

impl TaskProcessor {
    pub fn new(
        store: Arc<dyn TaskStore>,
        fetcher: Arc<dyn Fetcher>,
        downloads_dir: impl Into<PathBuf>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            fetcher,
            downloads_dir: downloads_dir.into(),
            metrics,
        }
    }

    /// Directory holding every file of one task
    pub fn task_dir(&self, task_id: &Uuid) -> PathBuf {
        self.downloads_dir.join(task_id.to_string())
    }

    /// Download every non-terminal file of `task` and mark the task completed.
    ///
    /// Per-file failures are recorded on the file and never fail the task.
    /// A store error stops the run and is returned; the task then stays
    /// in_progress until the next recovery pass.
    pub async fn process(&self, mut task: Task) -> Result<Task, StoreError> {
        info!(task_id = %task.id, files = task.urls.len(), "Processing task");
        task.status = TaskStatus::InProgress;

        let task_dir = self.task_dir(&task.id);
        if let Err(e) = tokio::fs::create_dir_all(&task_dir).await {
            // Each fetch will hit the same error and record it per file
            warn!(task_id = %task.id, dir = %task_dir.display(), error = %e, "Failed to create task directory");
        }

        let names = file_names(&task);

        for (index, name) in names.iter().enumerate() {
            if task.urls[index].status.is_terminal() {
                debug!(task_id = %task.id, index, "Skipping finished file");
                continue;
            }

            let dest = task_dir.join(name);
            let url = task.urls[index].url.clone();

            let file = &mut task.urls[index];
            file.mark_downloading();
            file.file_path = Some(dest.to_string_lossy().into_owned());
            self.store.save(&task)?;

            match self.download(&url, &dest).await {
                Ok(size) => {
                    info!(task_id = %task.id, url, size, "File downloaded");
                    task.urls[index].mark_completed(dest.to_string_lossy());
                    self.metrics.file_completed();
                }
                Err(e) => {
                    warn!(task_id = %task.id, url, error = %e, "File download failed");
                    task.urls[index].mark_failed(e.to_string());
                    self.metrics.file_failed();
                }
            }
            self.store.save(&task)?;
        }

        task.status = TaskStatus::Completed;
        self.store.save(&task)?;
        self.metrics.task_completed();

        info!(
            task_id = %task.id,
            completed = task.completed_files(),
            failed = task.failed_files(),
            "Task completed"
        );
        Ok(task)
    }

    async fn download(&self, url: &str, dest: &Path) -> http::Result<u64> {
        http::validate_url(url)?;
        self.fetcher.fetch(url, dest).await
    }
}

/// Last non-empty path segment of `url`, or [`FALLBACK_FILE_NAME`]
pub fn file_name_for(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
                .filter(|s| *s != "." && *s != "..")
                .map(str::to_string)
        })
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

/// Local file name for every slot of `task`, in slot order.
///
/// A name already taken by an earlier slot gets an `{index}_` prefix, then
/// `{index}_{n}_` for increasing `n` until the result is unused. Every
/// returned name is distinct.
pub fn file_names(task: &Task) -> Vec<String> {
    let mut taken = HashSet::new();

    task.urls
        .iter()
        .enumerate()
        .map(|(index, file)| {
            let base = file_name_for(&file.url);
            let name = unique_name(&taken, index, base);
            taken.insert(name.clone());
            name
        })
        .collect()
}

fn unique_name(taken: &HashSet<String>, index: usize, base: String) -> String {
    if !taken.contains(&base) {
        return base;
    }

    let prefixed = format!("{index}_{base}");
    if !taken.contains(&prefixed) {
        return prefixed;
    }

    (1..)
        .map(|n| format!("{index}_{n}_{base}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(prefixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryStore;
    use crate::task::FileStatus;
    use crate::worker::http::FetchError;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serves canned bodies keyed by URL; anything else is a 404
    #[derive(Default)]
    struct MockFetcher {
        bodies: HashMap<String, Vec<u8>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        fn with(pairs: &[(&str, &[u8])]) -> Self {
            Self {
                bodies: pairs
                    .iter()
                    .map(|(u, b)| (u.to_string(), b.to_vec()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, url: &str, dest: &Path) -> http::Result<u64> {
            self.calls.lock().unwrap().push(url.to_string());
            match self.bodies.get(url) {
                Some(body) => {
                    tokio::fs::write(dest, body).await?;
                    Ok(body.len() as u64)
                }
                None => Err(FetchError::BadStatus(StatusCode::NOT_FOUND)),
            }
        }
    }

    fn setup(
        fetcher: MockFetcher,
    ) -> (TaskProcessor, Arc<MemoryStore>, Arc<MockFetcher>, Arc<Metrics>, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(fetcher);
        let metrics = Arc::new(Metrics::new());
        let processor = TaskProcessor::new(
            store.clone(),
            fetcher.clone(),
            temp.path().join("downloads"),
            metrics.clone(),
        );
        (processor, store, fetcher, metrics, temp)
    }

    fn claimed(store: &MemoryStore, urls: &[&str]) -> Task {
        let task = store
            .create(urls.iter().map(|u| u.to_string()).collect())
            .unwrap();
        store.claim(&task.id).unwrap().unwrap()
    }

    #[test]
    fn test_file_name_for() {
        assert_eq!(file_name_for("http://x/a.png"), "a.png");
        assert_eq!(file_name_for("http://x/dir/b.bin?x=1"), "b.bin");
        assert_eq!(file_name_for("http://x/dir/"), "dir");
        assert_eq!(file_name_for("http://x/"), FALLBACK_FILE_NAME);
        assert_eq!(file_name_for("http://x"), FALLBACK_FILE_NAME);
        assert_eq!(file_name_for("not a url"), FALLBACK_FILE_NAME);
    }

    #[test]
    fn test_duplicate_names_get_index_prefix() {
        let task = Task::new(["http://x/a.png", "http://y/a.png", "http://x/b", "http://x/a.png"]);
        assert_eq!(
            file_names(&task),
            vec!["a.png", "1_a.png", "b", "3_a.png"]
        );
    }

    #[test]
    fn test_prefixed_name_already_taken() {
        let task = Task::new(["http://x/2_a.png", "http://x/a.png", "http://y/a.png"]);
        assert_eq!(file_names(&task), vec!["2_a.png", "a.png", "2_1_a.png"]);

        let task = Task::new([
            "http://x/3_a.png",
            "http://x/3_1_a.png",
            "http://x/a.png",
            "http://y/a.png",
        ]);
        let names = file_names(&task);
        assert_eq!(names[3], "3_2_a.png");

        let task = Task::new([
            "http://x/a.png",
            "http://x/1_a.png",
            "http://y/1_a.png",
            "http://z/a.png",
        ]);
        let names = file_names(&task);
        assert_eq!(names, vec!["a.png", "1_a.png", "2_1_a.png", "3_a.png"]);
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[tokio::test]
    async fn test_success_and_not_found() {
        let (processor, store, _, metrics, _temp) =
            setup(MockFetcher::with(&[("http://x/a.png", b"png-bytes")]));
        let task = claimed(&store, &["http://x/a.png", "http://x/missing.bin"]);

        let done = processor.process(task.clone()).await.unwrap();
        let stored = store.get(&task.id).unwrap().unwrap();
        assert_eq!(done, stored);

        assert_eq!(stored.status, TaskStatus::Completed);

        let ok = &stored.urls[0];
        assert_eq!(ok.status, FileStatus::Completed);
        let path = ok.file_path.as_deref().unwrap();
        assert!(path.ends_with(&format!("{}/a.png", task.id)));
        assert_eq!(std::fs::read(path).unwrap(), b"png-bytes");
        assert!(ok.completed_at.is_some());

        let missing = &stored.urls[1];
        assert_eq!(missing.status, FileStatus::Error);
        assert!(missing.error.as_deref().unwrap().contains("404"));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.files_completed, 1);
        assert_eq!(snapshot.files_failed, 1);
        assert_eq!(snapshot.tasks_completed, 1);
    }

    #[tokio::test]
    async fn test_partial_failure_still_completes() {
        let (processor, store, _, _, _temp) = setup(MockFetcher::with(&[
            ("http://x/one", b"1"),
            ("http://x/three", b"3"),
        ]));
        let task = claimed(&store, &["http://x/one", "http://x/two", "http://x/three"]);

        let done = processor.process(task).await.unwrap();

        assert_eq!(done.status, TaskStatus::Completed);
        let statuses: Vec<_> = done.urls.iter().map(|f| f.status).collect();
        assert_eq!(
            statuses,
            vec![FileStatus::Completed, FileStatus::Error, FileStatus::Completed]
        );
        assert!(done.all_files_terminal());
    }

    #[tokio::test]
    async fn test_invalid_url_is_file_error() {
        let (processor, store, fetcher, _, _temp) = setup(MockFetcher::default());
        let task = claimed(&store, &["ftp://x/a", "not a url"]);

        let done = processor.process(task).await.unwrap();

        assert_eq!(done.status, TaskStatus::Completed);
        for file in &done.urls {
            assert_eq!(file.status, FileStatus::Error);
            assert!(file.error.as_deref().unwrap().starts_with("Invalid URL"));
        }
        // Validation happens before any network call
        assert!(fetcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_files_are_skipped() {
        let (processor, store, fetcher, _, _temp) =
            setup(MockFetcher::with(&[("http://x/b", b"b")]));
        let mut task = claimed(&store, &["http://x/a", "http://x/b"]);
        task.urls[0].mark_completed("/elsewhere/a");
        store.save(&task).unwrap();

        let done = processor.process(task).await.unwrap();

        assert_eq!(*fetcher.calls.lock().unwrap(), vec!["http://x/b".to_string()]);
        assert_eq!(done.urls[0].file_path.as_deref(), Some("/elsewhere/a"));
        assert_eq!(done.urls[1].status, FileStatus::Completed);
    }

    #[tokio::test]
    async fn test_duplicate_urls_do_not_overwrite() {
        let (processor, store, _, _, _temp) =
            setup(MockFetcher::with(&[("http://x/a.png", b"same")]));
        let task = claimed(&store, &["http://x/a.png", "http://x/a.png"]);

        let done = processor.process(task).await.unwrap();

        let first = done.urls[0].file_path.clone().unwrap();
        let second = done.urls[1].file_path.clone().unwrap();
        assert_ne!(first, second);
        assert!(second.ends_with("1_a.png"));
        assert!(Path::new(&first).exists());
        assert!(Path::new(&second).exists());
    }

    #[tokio::test]
    async fn test_failed_slot_keeps_earlier_prefixed_file() {
        let (processor, store, _, _, _temp) = setup(MockFetcher::with(&[
            ("http://x/2_a.png", b"first"),
            ("http://x/a.png", b"second"),
        ]));
        // Third slot is a 404; its cleanup must not touch slot 0's file
        let task = claimed(&store, &["http://x/2_a.png", "http://x/a.png", "http://y/a.png"]);

        let done = processor.process(task).await.unwrap();

        let paths: Vec<_> = done
            .urls
            .iter()
            .map(|f| f.file_path.clone().unwrap())
            .collect();
        let unique: HashSet<_> = paths.iter().collect();
        assert_eq!(unique.len(), 3);
        assert!(paths[2].ends_with("2_1_a.png"));

        assert_eq!(done.urls[0].status, FileStatus::Completed);
        assert_eq!(done.urls[2].status, FileStatus::Error);
        assert_eq!(std::fs::read(&paths[0]).unwrap(), b"first");
        assert_eq!(std::fs::read(&paths[1]).unwrap(), b"second");
    }
}
