use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::core::platform::Platform;
use crate::error::DownloadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Downloading,
    /// Post-transfer muxing or audio extraction is running. A sub-phase of
    /// downloading from the caller's point of view.
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal statuses absorb every later mutation.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Live, mutable record of one download attempt. Owned by the tracker;
/// everything outside it sees clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    pub id: Uuid,
    pub url: String,
    pub platform: Platform,
    pub title: Option<String>,
    pub status: TaskStatus,
    pub percent: f64,
    pub downloaded_bytes: u64,
    /// Zero while the engine has not reported a size.
    pub total_bytes: u64,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub file_path: Option<PathBuf>,
    pub file_size: Option<u64>,
    pub message: String,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Partial field set merged into a task by [`ProgressTracker::update`].
/// `None` fields are left untouched.
///
/// [`ProgressTracker::update`]: crate::core::tracker::ProgressTracker::update
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub status: Option<TaskStatus>,
    pub title: Option<String>,
    pub percent: Option<f64>,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub message: Option<String>,
}

/// Immutable snapshot appended to the history log when a task goes terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub task_id: Uuid,
    pub url: String,
    pub platform: Platform,
    pub title: Option<String>,
    pub success: bool,
    pub file_path: Option<PathBuf>,
    pub file_size: Option<u64>,
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

/// Outcome of one orchestrated download. Always returned by value; the
/// orchestrator never lets an error escape as `Err`.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadReport {
    /// `None` only when classification failed and no task was created.
    pub task_id: Option<Uuid>,
    pub url: String,
    pub platform: Platform,
    pub title: Option<String>,
    pub file_path: Option<PathBuf>,
    pub file_size: Option<u64>,
    pub error: Option<DownloadError>,
}

impl DownloadReport {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}
