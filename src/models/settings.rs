use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Process-wide downloader configuration, built once at startup and passed
/// by reference. Nothing in the crate mutates it after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    pub output_dir: PathBuf,
    pub default_quality: String,
    pub default_container: String,
    /// Worker-pool width for batch downloads.
    pub max_workers: usize,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            output_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from("./downloads")),
            default_quality: "best".into(),
            default_container: "mp4".into(),
            max_workers: 3,
        }
    }
}
