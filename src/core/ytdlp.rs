use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc;

use crate::core::engine::{ExtractOptions, MediaEngine};
use crate::models::media::{
    MediaMetadata, PostProcessing, ProgressEvent, TransferPhase, TransferSpec,
};

/// Machine-readable progress lines: downloaded|total|speed|eta, `NA` for
/// fields the extractor cannot fill yet.
const PROGRESS_TEMPLATE: &str = "download:%(progress.downloaded_bytes)s|\
     %(progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.eta)s";

/// Stdout prefixes that mark the post-transfer muxing phase.
const POSTPROCESS_TAGS: &[&str] = &[
    "[Merger]",
    "[ExtractAudio]",
    "[EmbedSubtitle]",
    "[VideoRemuxer]",
    "[Fixup",
];

/// Engine implementation that shells out to the yt-dlp binary.
pub struct YtdlpEngine {
    binary: PathBuf,
}

impl YtdlpEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Probe the PATH for a working binary, then the managed bin directory.
    pub async fn locate() -> anyhow::Result<Self> {
        let bin_name = binary_name();

        if let Ok(status) = tokio::process::Command::new(bin_name)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            if status.success() {
                return Ok(Self::new(bin_name));
            }
        }

        if let Some(managed) = managed_binary_path() {
            if managed.exists() {
                return Ok(Self::new(managed));
            }
        }

        Err(anyhow!(
            "yt-dlp binary not found on PATH or in the managed bin directory"
        ))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

fn binary_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

fn managed_binary_path() -> Option<PathBuf> {
    let data = dirs::data_dir()?;
    Some(data.join("mediagrab").join("bin").join(binary_name()))
}

fn extract_args(url: &str, options: &ExtractOptions) -> Vec<String> {
    let mut args = vec![
        "--dump-json".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--user-agent".to_string(),
        options.user_agent.clone(),
    ];

    if let Some(source) = options.cookies_from_browser {
        args.push("--cookies-from-browser".to_string());
        args.push(source.as_str().to_string());
    }

    if options.extractor_retries > 0 {
        args.push("--extractor-retries".to_string());
        args.push(options.extractor_retries.to_string());
    }

    if let Some(ref country) = options.geo_bypass_country {
        args.push("--geo-bypass-country".to_string());
        args.push(country.clone());
    }

    args.push(url.to_string());
    args
}

fn transfer_args(url: &str, spec: &TransferSpec) -> Vec<String> {
    let output_template = spec
        .output_dir
        .join(&spec.filename_template)
        .to_string_lossy()
        .to_string();

    let mut args = vec![
        "-f".to_string(),
        spec.format_selector.clone(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--newline".to_string(),
        "--progress-template".to_string(),
        PROGRESS_TEMPLATE.to_string(),
        "-o".to_string(),
        output_template,
    ];

    if let Some(ref container) = spec.merge_container {
        args.push("--merge-output-format".to_string());
        args.push(container.clone());
    }

    for step in &spec.postprocessing {
        match step {
            PostProcessing::ExtractAudio { codec, quality } => {
                args.push("-x".to_string());
                args.push("--audio-format".to_string());
                args.push(codec.clone());
                args.push("--audio-quality".to_string());
                args.push(quality.clone());
            }
            PostProcessing::EmbedSubtitles => {
                args.push("--embed-subs".to_string());
            }
            PostProcessing::FaststartRemux => {
                args.push("--postprocessor-args".to_string());
                args.push("ffmpeg:-movflags +faststart".to_string());
            }
        }
    }

    args.push(url.to_string());
    args
}

fn parse_field(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("na") || raw.eq_ignore_ascii_case("null") {
        return None;
    }
    raw.parse::<f64>().ok()
}

fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix("download:") {
        let fields: Vec<&str> = rest.split('|').collect();
        if fields.len() != 4 {
            return None;
        }
        return Some(ProgressEvent {
            phase: TransferPhase::Downloading,
            downloaded_bytes: parse_field(fields[0]).map(|v| v as u64).unwrap_or(0),
            total_bytes: parse_field(fields[1]).map(|v| v as u64),
            rate_bytes_per_sec: parse_field(fields[2]),
            eta_seconds: parse_field(fields[3]),
            result_path: None,
        });
    }

    if POSTPROCESS_TAGS.iter().any(|tag| line.starts_with(tag)) {
        return Some(ProgressEvent::phase_only(TransferPhase::Postprocessing));
    }

    None
}

fn parse_metadata(json: &serde_json::Value) -> MediaMetadata {
    MediaMetadata {
        title: json
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string(),
        uploader: json
            .get("uploader")
            .or_else(|| json.get("channel"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        duration_seconds: json.get("duration").and_then(|v| v.as_f64()),
        thumbnail_url: json
            .get("thumbnail")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        view_count: json.get("view_count").and_then(|v| v.as_u64()),
        upload_date: json
            .get("upload_date")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        webpage_url: json
            .get("webpage_url")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        is_live: json
            .get("is_live")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    }
}

fn extract_id_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let segments: Vec<&str> = parsed.path().split('/').filter(|s| !s.is_empty()).collect();

    if host.contains("youtu.be") {
        return segments.first().map(|s| s.to_string());
    }

    if host.contains("youtube.com") {
        if segments.first() == Some(&"shorts") || segments.first() == Some(&"embed") {
            return segments.get(1).map(|s| s.to_string());
        }
        return parsed
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.to_string());
    }

    // facebook reels and instagram posts carry the id as the last segment
    if host.contains("facebook.com") || host.contains("instagram.com") {
        return segments.last().map(|s| s.to_string());
    }

    None
}

fn is_media_file(name: &str) -> bool {
    !name.starts_with('.') && !name.ends_with(".part") && !name.ends_with(".ytdl")
}

/// Newest finished file in the output dir whose name carries the media id.
/// Returns `None` when the id is unknown or nothing matches; the caller has
/// its own last-resort heuristic.
async fn find_artifact(output_dir: &Path, url: &str) -> Option<PathBuf> {
    let media_id = extract_id_from_url(url)?;
    if media_id.is_empty() {
        return None;
    }

    let mut entries = tokio::fs::read_dir(output_dir).await.ok()?;
    let mut best: Option<(PathBuf, std::time::SystemTime)> = None;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if !is_media_file(name) || !name.contains(&media_id) {
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

#[async_trait]
impl MediaEngine for YtdlpEngine {
    async fn extract_metadata(
        &self,
        url: &str,
        options: &ExtractOptions,
    ) -> anyhow::Result<MediaMetadata> {
        let output = tokio::process::Command::new(&self.binary)
            .args(extract_args(url, options))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| anyhow!("failed to run yt-dlp: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("yt-dlp extraction failed: {}", stderr.trim()));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| anyhow!("yt-dlp returned invalid JSON: {e}"))?;

        Ok(parse_metadata(&json))
    }

    async fn transfer(
        &self,
        url: &str,
        spec: &TransferSpec,
        progress: mpsc::Sender<ProgressEvent>,
    ) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&spec.output_dir).await?;

        let mut child = tokio::process::Command::new(&self.binary)
            .args(transfer_args(url, spec))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| anyhow!("failed to start yt-dlp: {e}"))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("yt-dlp has no stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("yt-dlp has no stderr"))?;

        let stderr_reader = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let progress_tx = progress.clone();
        let line_reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(event) = parse_progress_line(&line) {
                    let _ = progress_tx.send(event).await;
                }
            }
        });

        let status = child
            .wait()
            .await
            .map_err(|e| anyhow!("yt-dlp process failed: {e}"))?;

        let _ = line_reader.await;
        let stderr_output = stderr_reader.await.unwrap_or_default();

        if !status.success() {
            let _ = progress
                .send(ProgressEvent::phase_only(TransferPhase::Errored))
                .await;
            let tail: String = stderr_output
                .lines()
                .rev()
                .take(6)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(anyhow!("yt-dlp exited with {status}: {}", tail.trim()));
        }

        let artifact = find_artifact(&spec.output_dir, url).await;
        let _ = progress.send(ProgressEvent::finished(artifact)).await;

        Ok(())
    }
}
