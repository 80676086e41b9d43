use std::path::Path;

use serde::Serialize;

use crate::core::platform::Platform;
use crate::models::media::{PostProcessing, TransferSpec};

/// One entry of the process-wide preset catalog. The catalog itself is
/// immutable and lives for the whole process.
#[derive(Debug, Clone, Serialize)]
pub struct QualityPreset {
    pub name: &'static str,
    pub format_selector: &'static str,
    pub description: &'static str,
    pub max_height: Option<u32>,
    pub audio_only: bool,
    /// Audio codec forced by the preset itself, overriding the requested
    /// container. Only meaningful for audio-only presets.
    pub audio_codec: Option<&'static str>,
}

pub const PRESETS: &[QualityPreset] = &[
    QualityPreset {
        name: "best",
        format_selector: "bv*+ba/b",
        description: "Best available quality (video + audio)",
        max_height: None,
        audio_only: false,
        audio_codec: None,
    },
    QualityPreset {
        name: "worst",
        format_selector: "wv*+wa/w",
        description: "Worst available quality",
        max_height: None,
        audio_only: false,
        audio_codec: None,
    },
    QualityPreset {
        name: "4k",
        format_selector: "bv*[height<=2160]+ba/b[height<=2160]/bv*+ba/b",
        description: "Maximum 4K (2160p)",
        max_height: Some(2160),
        audio_only: false,
        audio_codec: None,
    },
    QualityPreset {
        name: "1080p",
        format_selector: "bv*[height<=1080]+ba/b[height<=1080]/bv*+ba/b",
        description: "Full HD (1080p)",
        max_height: Some(1080),
        audio_only: false,
        audio_codec: None,
    },
    QualityPreset {
        name: "720p",
        format_selector: "bv*[height<=720]+ba/b[height<=720]/bv*+ba/b",
        description: "HD (720p)",
        max_height: Some(720),
        audio_only: false,
        audio_codec: None,
    },
    QualityPreset {
        name: "480p",
        format_selector: "bv*[height<=480]+ba/b[height<=480]/bv*+ba/b",
        description: "SD (480p)",
        max_height: Some(480),
        audio_only: false,
        audio_codec: None,
    },
    QualityPreset {
        name: "360p",
        format_selector: "bv*[height<=360]+ba/b[height<=360]/bv*+ba/b",
        description: "Low quality (360p)",
        max_height: Some(360),
        audio_only: false,
        audio_codec: None,
    },
    QualityPreset {
        name: "audio",
        format_selector: "ba/b",
        description: "Best audio quality only",
        max_height: None,
        audio_only: true,
        audio_codec: None,
    },
    QualityPreset {
        name: "audio_mp3",
        format_selector: "ba/b",
        description: "Extract audio as MP3",
        max_height: None,
        audio_only: true,
        audio_codec: Some("mp3"),
    },
    QualityPreset {
        name: "audio_m4a",
        format_selector: "ba/b",
        description: "Extract audio as M4A",
        max_height: None,
        audio_only: true,
        audio_codec: Some("m4a"),
    },
];

pub const AUDIO_CONTAINERS: &[&str] = &["mp3", "m4a", "opus", "aac", "flac", "wav"];
pub const VIDEO_CONTAINERS: &[&str] = &["mp4", "mkv", "webm", "avi"];

const DEFAULT_AUDIO_CONTAINER: &str = "mp3";
const DEFAULT_AUDIO_QUALITY: &str = "192";

pub fn best() -> &'static QualityPreset {
    &PRESETS[0]
}

/// Case-insensitive preset lookup. Unknown names resolve to `best` rather
/// than failing.
pub fn resolve(name: &str) -> &'static QualityPreset {
    let wanted = name.trim().to_lowercase();
    PRESETS
        .iter()
        .find(|p| p.name == wanted)
        .unwrap_or_else(best)
}

pub fn preset_names() -> Vec<&'static str> {
    PRESETS.iter().map(|p| p.name).collect()
}

/// Highest capped preset that fits under `max_height`, `best` when none does.
pub fn preset_for_height(max_height: u32) -> &'static str {
    PRESETS
        .iter()
        .filter(|p| p.max_height.is_some_and(|h| h <= max_height))
        .max_by_key(|p| p.max_height)
        .map(|p| p.name)
        .unwrap_or("best")
}

/// Platform default: unrestricted for youtube, capped for platforms whose
/// sources rarely exceed 720p.
pub fn recommended_preset(platform: Platform) -> &'static str {
    match platform {
        Platform::Youtube => "best",
        Platform::Facebook | Platform::Instagram => "720p",
        Platform::Unknown => "best",
    }
}

/// Subset of the catalog that is meaningful for a platform.
pub fn platform_presets(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::Youtube => &[
            "best", "worst", "4k", "1080p", "720p", "480p", "360p", "audio", "audio_mp3",
            "audio_m4a",
        ],
        Platform::Facebook | Platform::Instagram => &[
            "best", "worst", "1080p", "720p", "480p", "360p", "audio", "audio_mp3",
        ],
        Platform::Unknown => &[],
    }
}

/// Turn a resolved preset into the concrete parameters the engine needs.
///
/// Audio-only presets extract into the requested container when it is an
/// audio container (or the preset forces a codec), falling back to MP3.
/// Video downloads into the platform's preferred container additionally get
/// subtitle embedding and a faststart remux; any other container is merged
/// as-is with no extra processing.
pub fn build_transfer_spec(
    preset: &QualityPreset,
    platform: Platform,
    container: &str,
    output_dir: &Path,
    filename_template: &str,
) -> TransferSpec {
    let container = container.trim().to_lowercase();

    let (merge_container, postprocessing) = if preset.audio_only {
        let codec = preset
            .audio_codec
            .map(str::to_string)
            .unwrap_or_else(|| {
                if AUDIO_CONTAINERS.contains(&container.as_str()) {
                    container.clone()
                } else {
                    DEFAULT_AUDIO_CONTAINER.to_string()
                }
            });
        (
            None,
            vec![PostProcessing::ExtractAudio {
                codec,
                quality: DEFAULT_AUDIO_QUALITY.to_string(),
            }],
        )
    } else if container == platform.preferred_container() {
        (
            Some(container.clone()),
            vec![PostProcessing::EmbedSubtitles, PostProcessing::FaststartRemux],
        )
    } else {
        (Some(container.clone()), Vec::new())
    };

    TransferSpec {
        format_selector: preset.format_selector.to_string(),
        output_dir: output_dir.to_path_buf(),
        filename_template: filename_template.to_string(),
        merge_container,
        postprocessing,
    }
}
