use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::models::media::{MediaMetadata, ProgressEvent, TransferSpec};

pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookieSource {
    Firefox,
    Chrome,
}

impl CookieSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Firefox => "firefox",
            Self::Chrome => "chrome",
        }
    }
}

/// Anti-detection knobs for metadata extraction. No credential material is
/// required for normal operation; browser cookies are only pulled in as a
/// fallback when an extraction hits a verification wall.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub user_agent: String,
    pub cookies_from_browser: Option<CookieSource>,
    pub extractor_retries: u32,
    pub geo_bypass_country: Option<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            user_agent: DESKTOP_USER_AGENT.to_string(),
            cookies_from_browser: None,
            extractor_retries: 3,
            geo_bypass_country: Some("US".to_string()),
        }
    }
}

impl ExtractOptions {
    /// Fixed attempt sequence walked when extraction is blocked by a
    /// verification wall: defaults, then Firefox cookies, then Chrome
    /// cookies, then a mobile client identity.
    pub fn fallback_chain() -> Vec<ExtractOptions> {
        vec![
            Self::default(),
            Self {
                cookies_from_browser: Some(CookieSource::Firefox),
                ..Self::default()
            },
            Self {
                cookies_from_browser: Some(CookieSource::Chrome),
                ..Self::default()
            },
            Self {
                user_agent: MOBILE_USER_AGENT.to_string(),
                ..Self::default()
            },
        ]
    }
}

/// The extraction and transfer engine the orchestrator drives. The only
/// I/O-performing dependency of the crate; both calls may block on network
/// or subprocess work for as long as they need, and neither is subject to a
/// timeout here.
///
/// `transfer` reports progress by sending [`ProgressEvent`]s into the given
/// channel; sends must stay cheap so the engine's own loop is never stalled
/// by a slow consumer.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn extract_metadata(
        &self,
        url: &str,
        options: &ExtractOptions,
    ) -> anyhow::Result<MediaMetadata>;

    async fn transfer(
        &self,
        url: &str,
        spec: &TransferSpec,
        progress: mpsc::Sender<ProgressEvent>,
    ) -> anyhow::Result<()>;
}
