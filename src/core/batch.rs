use std::path::PathBuf;

use futures::stream::{self, StreamExt};
use tracing::info;

use crate::core::downloader::{DownloadRequest, Downloader};
use crate::models::task::DownloadReport;

/// A batch of URLs sharing one quality/container/output choice.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub urls: Vec<String>,
    pub quality: Option<String>,
    pub container: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub concurrent: bool,
    /// Worker-pool width; `0` falls back to the configured default.
    pub max_workers: usize,
}

impl BatchRequest {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            quality: None,
            container: None,
            output_dir: None,
            concurrent: true,
            max_workers: 0,
        }
    }
}

impl Downloader {
    /// Fan a list of URLs out across a bounded worker pool. Always returns
    /// exactly one report per input URL; reports carry url and task id so
    /// callers can re-correlate, since completion order is not submission
    /// order. One URL failing never aborts the others.
    pub async fn download_batch(&self, batch: BatchRequest) -> Vec<DownloadReport> {
        let workers = if batch.max_workers == 0 {
            self.config().max_workers
        } else {
            batch.max_workers
        }
        .max(1);

        let request_for = |url: String| DownloadRequest {
            url,
            quality: batch.quality.clone(),
            container: batch.container.clone(),
            output_dir: batch.output_dir.clone(),
        };

        info!(
            urls = batch.urls.len(),
            workers,
            concurrent = batch.concurrent,
            "batch download started"
        );

        if !batch.concurrent || batch.urls.len() <= 1 {
            let mut reports = Vec::with_capacity(batch.urls.len());
            for url in batch.urls.clone() {
                reports.push(self.download(request_for(url)).await);
            }
            return reports;
        }

        // Excess URLs simply wait for a free worker; nothing is rejected.
        stream::iter(batch.urls.clone())
            .map(|url| self.download(request_for(url)))
            .buffer_unordered(workers)
            .collect()
            .await
    }
}
