use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata the engine extracts for a media URL before the transfer starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: String,
    pub uploader: Option<String>,
    pub duration_seconds: Option<f64>,
    pub thumbnail_url: Option<String>,
    pub view_count: Option<u64>,
    pub upload_date: Option<String>,
    pub webpage_url: Option<String>,
    pub is_live: bool,
}

/// Post-transfer processing steps the engine applies before a task is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PostProcessing {
    ExtractAudio { codec: String, quality: String },
    EmbedSubtitles,
    FaststartRemux,
}

/// Concrete parameters for one engine transfer: what to select, where to
/// write it, and how to finish it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSpec {
    pub format_selector: String,
    pub output_dir: PathBuf,
    pub filename_template: String,
    /// Container the selected streams are merged into, `None` for audio-only
    /// transfers where extraction decides the container.
    pub merge_container: Option<String>,
    pub postprocessing: Vec<PostProcessing>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferPhase {
    Downloading,
    Postprocessing,
    Finished,
    Errored,
}

/// Engine-native progress event, forwarded into the tracker by the
/// orchestrator's progress sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: TransferPhase,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    pub rate_bytes_per_sec: Option<f64>,
    pub eta_seconds: Option<f64>,
    pub result_path: Option<PathBuf>,
}

impl ProgressEvent {
    pub fn phase_only(phase: TransferPhase) -> Self {
        Self {
            phase,
            downloaded_bytes: 0,
            total_bytes: None,
            rate_bytes_per_sec: None,
            eta_seconds: None,
            result_path: None,
        }
    }

    pub fn finished(result_path: Option<PathBuf>) -> Self {
        Self {
            result_path,
            ..Self::phase_only(TransferPhase::Finished)
        }
    }
}
