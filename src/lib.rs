//! Task orchestration and progress tracking engine for social media
//! downloads.
//!
//! The crate classifies a media URL into a platform, resolves a named
//! quality preset into a concrete transfer spec, and supervises the
//! extraction and transfer work of an external [`MediaEngine`], tracking
//! per-task progress in a concurrency-safe store and fanning batches out
//! over a bounded worker pool. HTTP/CLI adapters live outside this crate
//! and consume the serde-serializable models directly.

pub mod core;
pub mod error;
pub mod models;

pub use crate::core::batch::BatchRequest;
pub use crate::core::downloader::{DownloadRequest, Downloader};
pub use crate::core::engine::{CookieSource, ExtractOptions, MediaEngine};
pub use crate::core::history::HistoryLog;
pub use crate::core::platform::{classify, is_supported, supported_platforms, Platform};
pub use crate::core::quality::{
    build_transfer_spec, platform_presets, recommended_preset, resolve, QualityPreset,
};
pub use crate::core::tracker::ProgressTracker;
pub use crate::core::ytdlp::YtdlpEngine;
pub use crate::error::DownloadError;
pub use crate::models::media::{
    MediaMetadata, PostProcessing, ProgressEvent, TransferPhase, TransferSpec,
};
pub use crate::models::settings::DownloaderConfig;
pub use crate::models::task::{
    DownloadReport, DownloadTask, HistoryRecord, ProgressUpdate, TaskStatus,
};
