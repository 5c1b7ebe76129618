//! Task and file records persisted by the ledger.
//!
//! A [`Task`] is one submitted batch of URLs. Each URL becomes a [`FileInfo`]
//! slot whose position in `urls` is its identity; duplicate URLs are separate
//! slots.
//!
//! Status strings are part of the persisted record and must stay exactly as
//! serialized here:
//!
//! ```json
//! {
//!   "id": "0190f1c2-...",
//!   "status": "in_progress",
//!   "urls": [
//!     { "url": "https://x/a.png", "status": "completed", "file_path": "storage/downloads/.../a.png" },
//!     { "url": "https://x/b.bin", "status": "downloading", "started_at": "2024-05-01T10:00:00Z" }
//!   ]
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Downloading,
    Completed,
    Error,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Downloading => "downloading",
            FileStatus::Completed => "completed",
            FileStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStatus::Completed | FileStatus::Error)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One download slot inside a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub url: String,
    pub status: FileStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl FileInfo {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: FileStatus::Pending,
            file_path: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn mark_downloading(&mut self) {
        self.status = FileStatus::Downloading;
        self.error = None;
        self.started_at = Some(Utc::now());
        self.completed_at = None;
    }

    pub fn mark_completed(&mut self, file_path: impl Into<String>) {
        self.status = FileStatus::Completed;
        self.file_path = Some(file_path.into());
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = FileStatus::Error;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    /// Put an interrupted download back in the queue. Returns true if the
    /// slot was changed.
    pub fn reset_in_flight(&mut self) -> bool {
        if self.status != FileStatus::Downloading {
            return false;
        }
        self.status = FileStatus::Pending;
        self.error = None;
        self.started_at = None;
        true
    }
}

/// Durable unit of work: an ordered batch of file downloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub status: TaskStatus,
    pub urls: Vec<FileInfo>,
}

impl Task {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: Uuid::now_v7(),
            status: TaskStatus::Pending,
            urls: urls.into_iter().map(FileInfo::new).collect(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// True once every file reached completed or error
    pub fn all_files_terminal(&self) -> bool {
        self.urls.iter().all(|file| file.status.is_terminal())
    }

    pub fn completed_files(&self) -> usize {
        self.urls
            .iter()
            .filter(|file| file.status == FileStatus::Completed)
            .count()
    }

    pub fn failed_files(&self) -> usize {
        self.urls
            .iter()
            .filter(|file| file.status == FileStatus::Error)
            .count()
    }

    /// Undo the effects of a crash mid-run: every downloading slot is reset
    /// and the task goes back to pending if it was owned or had a slot
    /// reset, so it is picked up again and can never be completed with a
    /// non-terminal file.
    ///
    /// Returns the number of file slots reset, or `None` when nothing changed.
    pub fn reset_in_flight(&mut self) -> Option<usize> {
        let files_reset = self
            .urls
            .iter_mut()
            .map(FileInfo::reset_in_flight)
            .filter(|reset| *reset)
            .count();

        if self.status != TaskStatus::InProgress && files_reset == 0 {
            return None;
        }

        self.status = TaskStatus::Pending;
        Some(files_reset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_pending() {
        let task = Task::new(["http://x/a.png", "http://x/b.png"]);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.urls.len(), 2);
        assert!(task.urls.iter().all(|f| f.status == FileStatus::Pending));
        assert_eq!(task.urls[0].url, "http://x/a.png");
        assert_eq!(task.urls[1].url, "http://x/b.png");
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&FileStatus::Downloading).unwrap(),
            "\"downloading\""
        );
        let status: TaskStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(status, TaskStatus::Completed);
    }

    #[test]
    fn test_record_omits_unset_fields() {
        let task = Task::new(["http://x/a.png"]);
        let value = serde_json::to_value(&task).unwrap();
        let file = &value["urls"][0];

        assert_eq!(value["status"], "pending");
        assert_eq!(file["status"], "pending");
        assert!(file.get("file_path").is_none());
        assert!(file.get("error").is_none());
        assert!(file.get("started_at").is_none());
    }

    #[test]
    fn test_file_transitions() {
        let mut file = FileInfo::new("http://x/a.png");
        file.mark_downloading();
        assert_eq!(file.status, FileStatus::Downloading);
        assert!(file.started_at.is_some());

        file.mark_failed("HTTP 404: Not Found");
        assert_eq!(file.status, FileStatus::Error);
        assert_eq!(file.error.as_deref(), Some("HTTP 404: Not Found"));
        assert!(file.status.is_terminal());
    }

    #[test]
    fn test_reset_in_flight() {
        let mut task = Task::new(["http://x/a", "http://x/b", "http://x/c"]);
        task.status = TaskStatus::InProgress;
        task.urls[0].mark_completed("/tmp/a");
        task.urls[1].mark_downloading();
        task.urls[1].error = Some("stale".to_string());

        assert_eq!(task.reset_in_flight(), Some(1));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.urls[0].status, FileStatus::Completed);
        assert_eq!(task.urls[1].status, FileStatus::Pending);
        assert!(task.urls[1].error.is_none());
        assert_eq!(task.urls[2].status, FileStatus::Pending);

        // Second pass is a no-op
        assert_eq!(task.reset_in_flight(), None);
    }

    #[test]
    fn test_reset_in_flight_reopens_finished_task() {
        let mut task = Task::new(["http://x/a", "http://x/b"]);
        task.status = TaskStatus::Completed;
        task.urls[0].mark_completed("/tmp/a");
        task.urls[1].mark_downloading();

        assert_eq!(task.reset_in_flight(), Some(1));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.urls[0].status, FileStatus::Completed);

        // A finished task with only terminal files is left alone
        let mut done = Task::new(["http://x/a"]);
        done.status = TaskStatus::Completed;
        done.urls[0].mark_failed("boom");
        assert_eq!(done.reset_in_flight(), None);
        assert_eq!(done.status, TaskStatus::Completed);
    }

    #[test]
    fn test_terminal_accounting() {
        let mut task = Task::new(["http://x/a", "http://x/b"]);
        assert!(!task.all_files_terminal());

        task.urls[0].mark_completed("/tmp/a");
        task.urls[1].mark_failed("boom");

        assert!(task.all_files_terminal());
        assert_eq!(task.completed_files(), 1);
        assert_eq!(task.failed_files(), 1);
    }
}
