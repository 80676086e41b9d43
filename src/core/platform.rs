use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Content platforms the downloader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Facebook,
    Instagram,
    Unknown,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
            Self::Unknown => "unknown",
        }
    }

    /// Container the platform's muxed downloads are best served in. Drives
    /// the subtitle-embed and faststart post-processing decision.
    pub fn preferred_container(self) -> &'static str {
        "mp4"
    }

    pub fn from_url(url: &str) -> Self {
        classify(url)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("invalid url pattern"))
        .collect()
}

static YOUTUBE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^https?://(www\.)?youtube\.com/watch\?v=[\w-]+",
        r"^https?://(www\.)?youtu\.be/[\w-]+",
        r"^https?://(www\.)?youtube\.com/shorts/[\w-]+",
        r"^https?://(www\.)?youtube\.com/playlist\?list=[\w-]+",
        r"^https?://(www\.)?youtube\.com/embed/[\w-]+",
        r"^https?://(www\.)?youtube-nocookie\.com/embed/[\w-]+",
    ])
});

static FACEBOOK: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^https?://(www\.)?facebook\.com/[\w./-]+/videos?/[\w/-]+",
        r"^https?://(www\.)?facebook\.com/watch/?\?v=\w+",
        r"^https?://(www\.)?facebook\.com/reel/[\w-]+",
        r"^https?://(www\.)?fb\.watch/[\w/-]+",
        r"^https?://(www\.)?facebook\.com/[\w.]+/posts/[\w-]+",
    ])
});

static INSTAGRAM: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^https?://(www\.)?instagram\.com/reel/[\w-]+",
        r"^https?://(www\.)?instagram\.com/p/[\w-]+",
        r"^https?://(www\.)?instagr\.am/p/[\w-]+",
        r"^https?://(www\.)?instagram\.com/tv/[\w-]+",
        r"^https?://(www\.)?instagram\.com/stories/[\w./-]+/[\w-]+",
    ])
});

/// Classify a media URL into a platform. Total and deterministic: trims,
/// lowercases, assumes `https://` when no scheme is given, and returns
/// [`Platform::Unknown`] when nothing matches. Never fails, never does I/O.
pub fn classify(url: &str) -> Platform {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Platform::Unknown;
    }

    let mut normalized = trimmed.to_lowercase();
    if !normalized.starts_with("http://") && !normalized.starts_with("https://") {
        normalized = format!("https://{normalized}");
    }

    let tables: [(&LazyLock<Vec<Regex>>, Platform); 3] = [
        (&YOUTUBE, Platform::Youtube),
        (&FACEBOOK, Platform::Facebook),
        (&INSTAGRAM, Platform::Instagram),
    ];

    for (table, platform) in tables {
        if table.iter().any(|re| re.is_match(&normalized)) {
            return platform;
        }
    }

    Platform::Unknown
}

pub fn supported_platforms() -> &'static [Platform] {
    &[Platform::Youtube, Platform::Facebook, Platform::Instagram]
}

pub fn is_supported(url: &str) -> bool {
    classify(url) != Platform::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn youtube_watch_url() {
        assert_eq!(
            classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Platform::Youtube
        );
    }

    #[test]
    fn youtube_short_link() {
        assert_eq!(classify("https://youtu.be/abc123"), Platform::Youtube);
    }

    #[test]
    fn youtube_shorts() {
        assert_eq!(
            classify("https://youtube.com/shorts/xyz-987"),
            Platform::Youtube
        );
    }

    #[test]
    fn facebook_watch() {
        assert_eq!(
            classify("https://www.facebook.com/watch/?v=123456789"),
            Platform::Facebook
        );
    }

    #[test]
    fn facebook_short_domain() {
        assert_eq!(classify("https://fb.watch/aBcD123/"), Platform::Facebook);
    }

    #[test]
    fn instagram_reel() {
        assert_eq!(
            classify("https://www.instagram.com/reel/Cxyz_123"),
            Platform::Instagram
        );
    }

    #[test]
    fn instagram_post() {
        assert_eq!(classify("instagram.com/p/Cabc123"), Platform::Instagram);
    }

    #[test]
    fn unrelated_url_is_unknown() {
        assert_eq!(classify("https://example.com/x"), Platform::Unknown);
    }

    #[test]
    fn channel_page_is_unknown() {
        // Only downloadable content URLs classify, not profile pages.
        assert_eq!(classify("https://www.youtube.com/@somechannel"), Platform::Unknown);
    }

    #[test]
    fn empty_and_whitespace_are_unknown() {
        assert_eq!(classify(""), Platform::Unknown);
        assert_eq!(classify("   "), Platform::Unknown);
    }

    #[test]
    fn scheme_is_optional() {
        assert_eq!(classify("youtu.be/abc123"), Platform::Youtube);
        assert_eq!(classify("www.youtube.com/watch?v=abc123"), Platform::Youtube);
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(
            classify("HTTPS://WWW.YOUTUBE.COM/WATCH?V=ABC123"),
            Platform::Youtube
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let url = "https://youtu.be/abc123";
        let first = classify(url);
        for _ in 0..10 {
            assert_eq!(classify(url), first);
        }
    }

    #[test]
    fn unknown_is_not_supported() {
        assert!(is_supported("https://youtu.be/abc123"));
        assert!(!is_supported("https://example.com/video.mp4"));
    }
}
