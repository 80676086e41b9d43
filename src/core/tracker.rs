use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use uuid::Uuid;

use crate::core::platform::Platform;
use crate::models::task::{DownloadTask, ProgressUpdate, TaskStatus};

/// Concurrency-safe store of download tasks. The tracker is the sole writer;
/// every read hands out a clone, so callers never touch shared state.
///
/// Each operation takes the lock for a short critical section and releases
/// it before returning; the lock is never held across an await point.
#[derive(Default)]
pub struct ProgressTracker {
    tasks: Mutex<HashMap<Uuid, DownloadTask>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, DownloadTask>> {
        // A poisoned lock only means a panic elsewhere; the map itself is
        // still usable.
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a fresh task in `Queued` state and return a copy of it. Ids
    /// are random v4 uuids and are never reused.
    pub fn create(&self, url: &str, platform: Platform) -> DownloadTask {
        let task = DownloadTask {
            id: Uuid::new_v4(),
            url: url.to_string(),
            platform,
            title: None,
            status: TaskStatus::Queued,
            percent: 0.0,
            downloaded_bytes: 0,
            total_bytes: 0,
            speed: None,
            eta: None,
            file_path: None,
            file_size: None,
            message: "download queued".to_string(),
            error: None,
            updated_at: Utc::now(),
        };
        self.lock().insert(task.id, task.clone());
        task
    }

    /// Merge the supplied fields into an existing task. A no-op when the id
    /// is unknown (progress callbacks may race task removal) or the task is
    /// already terminal.
    pub fn update(&self, id: Uuid, update: ProgressUpdate) {
        let mut tasks = self.lock();
        let Some(task) = tasks.get_mut(&id) else {
            return;
        };
        if task.status.is_terminal() {
            return;
        }

        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(title) = update.title {
            task.title = Some(title);
        }
        if let Some(percent) = update.percent {
            task.percent = percent.clamp(0.0, 100.0);
        }
        if let Some(downloaded) = update.downloaded_bytes {
            task.downloaded_bytes = downloaded;
        }
        if let Some(total) = update.total_bytes {
            task.total_bytes = total;
        }
        if let Some(speed) = update.speed {
            task.speed = Some(speed);
        }
        if let Some(eta) = update.eta {
            task.eta = Some(eta);
        }
        if let Some(message) = update.message {
            task.message = message;
        }
        task.updated_at = Utc::now();
    }

    /// Force a task to `Completed` with its final file info. Idempotent: a
    /// second call against a terminal task changes nothing.
    pub fn set_complete(
        &self,
        id: Uuid,
        file_path: Option<PathBuf>,
        file_size: Option<u64>,
        title: Option<String>,
    ) {
        let mut tasks = self.lock();
        let Some(task) = tasks.get_mut(&id) else {
            return;
        };
        if task.status.is_terminal() {
            return;
        }

        task.status = TaskStatus::Completed;
        task.percent = 100.0;
        task.file_path = file_path;
        task.file_size = file_size;
        if title.is_some() {
            task.title = title;
        }
        task.speed = None;
        task.eta = None;
        task.message = "download completed".to_string();
        task.updated_at = Utc::now();
    }

    pub fn set_failed(&self, id: Uuid, error: impl Into<String>) {
        let mut tasks = self.lock();
        let Some(task) = tasks.get_mut(&id) else {
            return;
        };
        if task.status.is_terminal() {
            return;
        }

        let error = error.into();
        task.status = TaskStatus::Failed;
        task.message = format!("download failed: {error}");
        task.error = Some(error);
        task.speed = None;
        task.eta = None;
        task.updated_at = Utc::now();
    }

    /// Advisory cancellation: marks intent without interrupting in-flight
    /// engine work. Only effective while the task is queued, downloading, or
    /// in the processing sub-phase. Returns whether the mark was applied.
    pub fn set_cancelled(&self, id: Uuid) -> bool {
        let mut tasks = self.lock();
        let Some(task) = tasks.get_mut(&id) else {
            return false;
        };
        match task.status {
            TaskStatus::Queued | TaskStatus::Downloading | TaskStatus::Processing => {
                task.status = TaskStatus::Cancelled;
                task.message = "download cancelled".to_string();
                task.speed = None;
                task.eta = None;
                task.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<DownloadTask> {
        self.lock().get(&id).cloned()
    }

    pub fn all(&self) -> HashMap<Uuid, DownloadTask> {
        self.lock().clone()
    }

    pub fn by_status(&self, status: TaskStatus) -> Vec<DownloadTask> {
        self.lock()
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect()
    }

    pub fn remove(&self, id: Uuid) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
