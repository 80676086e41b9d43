use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::engine::{ExtractOptions, MediaEngine};
use crate::core::history::HistoryLog;
use crate::core::platform::{self, Platform};
use crate::core::quality;
use crate::core::tracker::ProgressTracker;
use crate::core::{blocking, format};
use crate::error::DownloadError;
use crate::models::media::{MediaMetadata, ProgressEvent, TransferPhase};
use crate::models::settings::DownloaderConfig;
use crate::models::task::{
    DownloadReport, DownloadTask, HistoryRecord, ProgressUpdate, TaskStatus,
};

const FILENAME_TEMPLATE: &str = "%(title).200s [%(id)s].%(ext)s";

/// Parameters for one download. Fields left `None` fall back to the
/// downloader's configuration.
#[derive(Debug, Clone, Default)]
pub struct DownloadRequest {
    pub url: String,
    pub quality: Option<String>,
    pub container: Option<String>,
    pub output_dir: Option<PathBuf>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Orchestrates single downloads end to end: classification, task creation,
/// metadata extraction with its fallback chain, transfer with progress
/// forwarding, artifact location, and the terminal transition.
pub struct Downloader {
    engine: Arc<dyn MediaEngine>,
    tracker: Arc<ProgressTracker>,
    history: Arc<HistoryLog>,
    config: DownloaderConfig,
}

impl Downloader {
    pub fn new(engine: Arc<dyn MediaEngine>, config: DownloaderConfig) -> Self {
        Self {
            engine,
            tracker: Arc::new(ProgressTracker::new()),
            history: Arc::new(HistoryLog::new()),
            config,
        }
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    /// Shared handle to the task store, for adapters polling progress.
    pub fn tracker(&self) -> Arc<ProgressTracker> {
        self.tracker.clone()
    }

    pub fn progress(&self, task_id: Uuid) -> Result<DownloadTask, DownloadError> {
        self.tracker
            .get(task_id)
            .ok_or(DownloadError::TaskNotFound(task_id))
    }

    /// Advisory cancellation; see [`ProgressTracker::set_cancelled`].
    pub fn cancel(&self, task_id: Uuid) -> bool {
        self.tracker.set_cancelled(task_id)
    }

    pub fn history(&self) -> Vec<HistoryRecord> {
        self.history.snapshot()
    }

    /// Drops the history log and all tracked tasks.
    pub fn clear_history(&self) {
        self.history.clear();
        self.tracker.clear();
    }

    /// Run one download to a terminal state. Never returns an error: every
    /// failure ends up inside the report, with the task (when one was
    /// created) moved to `Failed` and a history record appended.
    pub async fn download(&self, request: DownloadRequest) -> DownloadReport {
        let platform = platform::classify(&request.url);
        if platform == Platform::Unknown {
            debug!(url = %request.url, "rejected: no platform matched");
            return DownloadReport {
                task_id: None,
                url: request.url.clone(),
                platform,
                title: None,
                file_path: None,
                file_size: None,
                error: Some(DownloadError::UnsupportedPlatform(request.url)),
            };
        }

        let task = self.tracker.create(&request.url, platform);
        info!(task_id = %task.id, platform = %platform, url = %request.url, "download started");

        match self.run_to_completion(&request, platform, task.id).await {
            Ok(done) => {
                self.history.append(HistoryRecord {
                    task_id: task.id,
                    url: request.url.clone(),
                    platform,
                    title: Some(done.title.clone()),
                    success: true,
                    file_path: Some(done.file_path.clone()),
                    file_size: done.file_size,
                    error: None,
                    finished_at: Utc::now(),
                });
                DownloadReport {
                    task_id: Some(task.id),
                    url: request.url,
                    platform,
                    title: Some(done.title),
                    file_path: Some(done.file_path),
                    file_size: done.file_size,
                    error: None,
                }
            }
            Err(error) => {
                warn!(task_id = %task.id, %error, "download failed");
                self.tracker.set_failed(task.id, error.to_string());
                let title = self.tracker.get(task.id).and_then(|t| t.title);
                self.history.append(HistoryRecord {
                    task_id: task.id,
                    url: request.url.clone(),
                    platform,
                    title: title.clone(),
                    success: false,
                    file_path: None,
                    file_size: None,
                    error: Some(error.to_string()),
                    finished_at: Utc::now(),
                });
                DownloadReport {
                    task_id: Some(task.id),
                    url: request.url,
                    platform,
                    title,
                    file_path: None,
                    file_size: None,
                    error: Some(error),
                }
            }
        }
    }

    async fn run_to_completion(
        &self,
        request: &DownloadRequest,
        platform: Platform,
        task_id: Uuid,
    ) -> Result<CompletedDownload, DownloadError> {
        let metadata = self.extract_with_fallback(&request.url).await?;
        let title = metadata.title.clone();

        let quality_name = request
            .quality
            .as_deref()
            .unwrap_or(&self.config.default_quality);
        let container = request
            .container
            .as_deref()
            .unwrap_or(&self.config.default_container);
        let output_dir = request
            .output_dir
            .as_deref()
            .unwrap_or(&self.config.output_dir)
            .to_path_buf();

        let preset = quality::resolve(quality_name);
        let spec = quality::build_transfer_spec(
            preset,
            platform,
            container,
            &output_dir,
            FILENAME_TEMPLATE,
        );

        self.tracker.update(
            task_id,
            ProgressUpdate {
                status: Some(TaskStatus::Downloading),
                title: Some(title.clone()),
                message: Some(format!("downloading: {title}")),
                ..Default::default()
            },
        );

        let (tx, rx) = mpsc::channel::<ProgressEvent>(32);
        let forwarder = tokio::spawn(forward_progress(self.tracker.clone(), task_id, rx));

        let transfer_result = self.engine.transfer(&request.url, &spec, tx).await;

        // The sender side is dropped once transfer returns, so the forwarder
        // drains whatever is left and exits.
        let reported_path = forwarder.await.unwrap_or_default();

        transfer_result.map_err(|e| DownloadError::Transfer(format!("{e:#}")))?;

        let file_path = match reported_path {
            Some(path) if path.is_file() => path,
            _ => {
                warn!(task_id = %task_id, dir = %output_dir.display(),
                    "engine reported no artifact path, scanning output dir");
                most_recent_file(&output_dir)
                    .await
                    .ok_or(DownloadError::ArtifactNotFound(output_dir.clone()))?
            }
        };

        let file_size = tokio::fs::metadata(&file_path).await.ok().map(|m| m.len());
        self.tracker
            .set_complete(task_id, Some(file_path.clone()), file_size, Some(title.clone()));
        info!(task_id = %task_id, path = %file_path.display(), "download completed");

        Ok(CompletedDownload {
            title,
            file_path,
            file_size,
        })
    }

    /// Metadata extraction with the bot-wall fallback chain. Only errors
    /// carrying a verification-block signature advance the chain; anything
    /// else fails immediately. This is the sole retry in the pipeline.
    async fn extract_with_fallback(&self, url: &str) -> Result<MediaMetadata, DownloadError> {
        let chain = ExtractOptions::fallback_chain();
        let mut last_error = String::new();

        for (attempt, options) in chain.into_iter().enumerate() {
            if attempt > 0 {
                info!(url, attempt, "retrying extraction with fallback identity");
            }
            match self.engine.extract_metadata(url, &options).await {
                Ok(metadata) => return Ok(metadata),
                Err(e) => {
                    let message = format!("{e:#}");
                    let blocked = blocking::is_verification_block(&message);
                    last_error = message;
                    if !blocked {
                        break;
                    }
                }
            }
        }

        Err(DownloadError::Extraction(last_error))
    }
}

struct CompletedDownload {
    title: String,
    file_path: PathBuf,
    file_size: Option<u64>,
}

/// Maps engine progress events into tracker updates. Returns the artifact
/// path from the terminal `Finished` event, when the engine reported one.
async fn forward_progress(
    tracker: Arc<ProgressTracker>,
    task_id: Uuid,
    mut rx: mpsc::Receiver<ProgressEvent>,
) -> Option<PathBuf> {
    let mut result_path = None;

    while let Some(event) = rx.recv().await {
        match event.phase {
            TransferPhase::Downloading => {
                let percent = event
                    .total_bytes
                    .filter(|total| *total > 0)
                    .map(|total| (event.downloaded_bytes as f64 / total as f64) * 100.0);
                tracker.update(
                    task_id,
                    ProgressUpdate {
                        status: Some(TaskStatus::Downloading),
                        percent,
                        downloaded_bytes: Some(event.downloaded_bytes),
                        total_bytes: event.total_bytes,
                        speed: event.rate_bytes_per_sec.map(format::format_speed),
                        eta: event.eta_seconds.map(format::format_eta),
                        ..Default::default()
                    },
                );
            }
            TransferPhase::Postprocessing => {
                tracker.update(
                    task_id,
                    ProgressUpdate {
                        status: Some(TaskStatus::Processing),
                        message: Some("processing media".to_string()),
                        ..Default::default()
                    },
                );
            }
            TransferPhase::Finished => {
                if event.result_path.is_some() {
                    result_path = event.result_path;
                }
            }
            TransferPhase::Errored => {
                debug!(task_id = %task_id, "engine reported an error event");
            }
        }
    }

    result_path
}

/// Last-resort artifact location: the most recently modified non-hidden,
/// non-partial file in the output directory. Best effort only; when several
/// tasks share one directory a concurrent writer can win the race.
async fn most_recent_file(output_dir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(output_dir).await.ok()?;
    let mut best: Option<(PathBuf, std::time::SystemTime)> = None;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.starts_with('.') || name.ends_with(".part") || name.ends_with(".ytdl") {
            continue;
        }
        if let Ok(meta) = entry.metadata().await {
            if let Ok(modified) = meta.modified() {
                if best.as_ref().is_none_or(|(_, t)| modified > *t) {
                    best = Some((path, modified));
                }
            }
        }
    }

    best.map(|(path, _)| path)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::media::TransferSpec;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted engine for orchestration tests.
    pub(crate) struct MockEngine {
        /// Extraction attempts that fail before one succeeds.
        pub fail_extracts: usize,
        pub extract_error: String,
        pub fail_transfer: Option<String>,
        /// Whether the transfer reports the written file in its finished
        /// event, or leaves the orchestrator to scan for it.
        pub report_artifact: bool,
        pub extract_calls: AtomicUsize,
    }

    impl Default for MockEngine {
        fn default() -> Self {
            Self {
                fail_extracts: 0,
                extract_error: "Sign in to confirm you're not a bot".into(),
                fail_transfer: None,
                report_artifact: true,
                extract_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MediaEngine for MockEngine {
        async fn extract_metadata(
            &self,
            _url: &str,
            _options: &ExtractOptions,
        ) -> anyhow::Result<MediaMetadata> {
            let attempt = self.extract_calls.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_extracts {
                anyhow::bail!("{}", self.extract_error);
            }
            Ok(MediaMetadata {
                title: "test clip".into(),
                uploader: Some("someone".into()),
                duration_seconds: Some(10.0),
                thumbnail_url: None,
                view_count: Some(3),
                upload_date: None,
                webpage_url: None,
                is_live: false,
            })
        }

        async fn transfer(
            &self,
            _url: &str,
            spec: &TransferSpec,
            progress: mpsc::Sender<ProgressEvent>,
        ) -> anyhow::Result<()> {
            let _ = progress
                .send(ProgressEvent {
                    phase: TransferPhase::Downloading,
                    downloaded_bytes: 500,
                    total_bytes: Some(1000),
                    rate_bytes_per_sec: Some(250.0),
                    eta_seconds: Some(2.0),
                    result_path: None,
                })
                .await;

            if let Some(ref message) = self.fail_transfer {
                let _ = progress
                    .send(ProgressEvent::phase_only(TransferPhase::Errored))
                    .await;
                anyhow::bail!("{message}");
            }

            let path = spec.output_dir.join("test clip [abc123].mp4");
            tokio::fs::create_dir_all(&spec.output_dir).await?;
            tokio::fs::write(&path, b"media bytes").await?;

            let _ = progress
                .send(ProgressEvent::phase_only(TransferPhase::Postprocessing))
                .await;
            let reported = self.report_artifact.then(|| path.clone());
            let _ = progress.send(ProgressEvent::finished(reported)).await;
            Ok(())
        }
    }

    pub(crate) fn downloader_with(engine: Arc<MockEngine>, output_dir: &Path) -> Downloader {
        let config = DownloaderConfig {
            output_dir: output_dir.to_path_buf(),
            ..Default::default()
        };
        Downloader::new(engine, config)
    }

    #[tokio::test]
    async fn successful_download_completes_the_task() {
        let dir = tempfile::tempdir().unwrap();
        let dl = downloader_with(Arc::new(MockEngine::default()), dir.path());

        let report = dl
            .download(DownloadRequest::new("https://youtu.be/abc123"))
            .await;

        assert!(report.success());
        assert_eq!(report.platform, Platform::Youtube);
        assert_eq!(report.title.as_deref(), Some("test clip"));
        assert_eq!(report.file_size, Some(11));

        let task = dl.progress(report.task_id.unwrap()).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.percent, 100.0);
        assert!(task.file_path.is_some());

        let history = dl.history();
        assert_eq!(history.len(), 1);
        assert!(history[0].success);
    }

    #[tokio::test]
    async fn unsupported_platform_creates_no_task() {
        let dir = tempfile::tempdir().unwrap();
        let dl = downloader_with(Arc::new(MockEngine::default()), dir.path());

        let report = dl
            .download(DownloadRequest::new("https://example.com/x"))
            .await;

        assert!(!report.success());
        assert!(report.task_id.is_none());
        assert!(matches!(
            report.error,
            Some(DownloadError::UnsupportedPlatform(_))
        ));
        assert!(dl.tracker().is_empty());
        assert!(dl.history().is_empty());
    }

    #[tokio::test]
    async fn bot_wall_walks_the_fallback_chain() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine {
            fail_extracts: 2,
            ..Default::default()
        });
        let dl = downloader_with(engine, dir.path());

        let report = dl
            .download(DownloadRequest::new("https://youtu.be/abc123"))
            .await;

        assert!(report.success());
        let task = dl.progress(report.task_id.unwrap()).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn exhausted_fallback_chain_fails_the_task() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine {
            fail_extracts: usize::MAX,
            ..Default::default()
        });
        let dl = downloader_with(engine, dir.path());

        let report = dl
            .download(DownloadRequest::new("https://youtu.be/abc123"))
            .await;

        assert!(!report.success());
        assert!(matches!(report.error, Some(DownloadError::Extraction(_))));
        let task = dl.progress(report.task_id.unwrap()).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn non_blocking_extraction_error_fails_without_retries() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine {
            fail_extracts: usize::MAX,
            extract_error: "Video unavailable".into(),
            ..Default::default()
        });
        let dl = downloader_with(engine.clone(), dir.path());

        let report = dl
            .download(DownloadRequest::new("https://youtu.be/abc123"))
            .await;

        assert!(!report.success());
        let attempts = engine.extract_calls.load(Ordering::SeqCst);
        assert_eq!(attempts, 1, "hard failures must not walk the chain");
    }

    #[tokio::test]
    async fn transfer_failure_lands_in_history() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine {
            fail_transfer: Some("network gave up".into()),
            ..Default::default()
        });
        let dl = downloader_with(engine, dir.path());

        let report = dl
            .download(DownloadRequest::new("https://youtu.be/abc123"))
            .await;

        assert!(!report.success());
        assert!(matches!(report.error, Some(DownloadError::Transfer(_))));

        let task = dl.progress(report.task_id.unwrap()).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.as_deref().unwrap().contains("network gave up"));

        let history = dl.history();
        assert_eq!(history.len(), 1);
        assert!(!history[0].success);
    }

    #[tokio::test]
    async fn artifact_scan_kicks_in_when_engine_reports_no_path() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine {
            report_artifact: false,
            ..Default::default()
        });
        let dl = downloader_with(engine, dir.path());

        let report = dl
            .download(DownloadRequest::new("https://youtu.be/abc123"))
            .await;

        assert!(report.success());
        let path = report.file_path.unwrap();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("test clip [abc123].mp4")
        );
    }

    #[tokio::test]
    async fn progress_events_reach_the_tracker() {
        // Drive the forwarder directly so intermediate state is observable.
        let tracker = Arc::new(ProgressTracker::new());
        let task = tracker.create("https://youtu.be/abc123", Platform::Youtube);

        let (tx, rx) = mpsc::channel(8);
        let forwarder = tokio::spawn(forward_progress(tracker.clone(), task.id, rx));

        tx.send(ProgressEvent {
            phase: TransferPhase::Downloading,
            downloaded_bytes: 250,
            total_bytes: Some(1000),
            rate_bytes_per_sec: Some(1024.0),
            eta_seconds: Some(30.0),
            result_path: None,
        })
        .await
        .unwrap();
        tx.send(ProgressEvent::phase_only(TransferPhase::Postprocessing))
            .await
            .unwrap();
        tx.send(ProgressEvent::finished(Some(PathBuf::from("/tmp/x.mp4"))))
            .await
            .unwrap();
        drop(tx);

        let reported = forwarder.await.unwrap();
        assert_eq!(reported, Some(PathBuf::from("/tmp/x.mp4")));

        let seen = tracker.get(task.id).unwrap();
        assert_eq!(seen.status, TaskStatus::Processing);
        assert_eq!(seen.percent, 25.0);
        assert_eq!(seen.downloaded_bytes, 250);
        assert_eq!(seen.total_bytes, 1000);
        assert_eq!(seen.speed.as_deref(), Some("1.00 KB/s"));
        assert_eq!(seen.eta.as_deref(), Some("30s"));
    }

    #[tokio::test]
    async fn cancelled_task_ignores_late_progress() {
        let tracker = Arc::new(ProgressTracker::new());
        let task = tracker.create("https://youtu.be/abc123", Platform::Youtube);
        tracker.set_cancelled(task.id);

        let (tx, rx) = mpsc::channel(8);
        let forwarder = tokio::spawn(forward_progress(tracker.clone(), task.id, rx));
        tx.send(ProgressEvent {
            phase: TransferPhase::Downloading,
            downloaded_bytes: 999,
            total_bytes: Some(1000),
            rate_bytes_per_sec: None,
            eta_seconds: None,
            result_path: None,
        })
        .await
        .unwrap();
        drop(tx);
        forwarder.await.unwrap();

        let seen = tracker.get(task.id).unwrap();
        assert_eq!(seen.status, TaskStatus::Cancelled);
        assert_eq!(seen.downloaded_bytes, 0);
    }

    #[tokio::test]
    async fn unknown_task_lookup_is_a_typed_error() {
        let dir = tempfile::tempdir().unwrap();
        let dl = downloader_with(Arc::new(MockEngine::default()), dir.path());
        assert!(matches!(
            dl.progress(Uuid::new_v4()),
            Err(DownloadError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn clear_history_drops_tasks_too() {
        let dir = tempfile::tempdir().unwrap();
        let dl = downloader_with(Arc::new(MockEngine::default()), dir.path());
        dl.download(DownloadRequest::new("https://youtu.be/abc123"))
            .await;

        assert_eq!(dl.history().len(), 1);
        assert_eq!(dl.tracker().len(), 1);

        dl.clear_history();
        assert!(dl.history().is_empty());
        assert!(dl.tracker().is_empty());
    }
}
