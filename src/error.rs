use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Failure taxonomy for download operations. Errors are carried inside
/// [`DownloadReport`](crate::models::task::DownloadReport) values rather than
/// bubbled out of the public API.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DownloadError {
    #[error("unsupported platform for url: {0}")]
    UnsupportedPlatform(String),

    /// Metadata extraction failed after the whole fallback chain was tried.
    /// Carries the last underlying cause.
    #[error("metadata extraction failed: {0}")]
    Extraction(String),

    #[error("transfer failed: {0}")]
    Transfer(String),

    /// The engine reported a successful transfer but no media file could be
    /// located in the output directory.
    #[error("no media file found in {}", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("no task with id {0}")]
    TaskNotFound(Uuid),
}
