// InfoExtractor trait and common types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::downloader::errors::DownloadError;

/// One immutable extraction configuration tried against the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    /// Player client identity (tv_embedded, ios, android); `None` lets the engine decide
    pub client: Option<String>,
    /// Pass the configured credentials file
    pub use_cookies: bool,
    /// Ask the engine to tolerate per-item errors and return nothing instead of failing
    pub ignore_errors: bool,
}

impl Strategy {
    pub fn new(client: Option<&str>, use_cookies: bool, ignore_errors: bool) -> Self {
        Self {
            client: client.map(str::to_string),
            use_cookies,
            ignore_errors,
        }
    }

    pub fn client_label(&self) -> &str {
        self.client.as_deref().unwrap_or("auto")
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "client={}, cookies={}",
            self.client_label(),
            self.use_cookies
        )
    }
}

/// Format information as reported by the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtendedFormat {
    /// Format ID (e.g., "137", "140")
    pub format_id: String,
    /// File extension (mp4, webm, m4a)
    pub ext: String,
    /// Resolution string (e.g., "1920x1080")
    pub resolution: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f32>,
    /// Video codec (avc1, vp9, av01, none)
    pub vcodec: Option<String>,
    /// Audio codec (mp4a, opus, none)
    pub acodec: Option<String>,
    /// File size in bytes
    pub filesize: Option<u64>,
    /// Approximate file size (when exact is unknown)
    pub filesize_approx: Option<u64>,
    /// Total bitrate in kbps
    pub tbr: Option<f32>,
    /// Audio bitrate in kbps
    pub abr: Option<f32>,
    pub format_note: Option<String>,
    /// Whether this is video-only (no audio)
    pub video_only: bool,
    /// Whether this is audio-only (no video)
    pub audio_only: bool,
}

impl ExtendedFormat {
    /// Get effective file size (exact or approximate)
    pub fn effective_size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }

    /// Carries a video stream (codec present and not "none")
    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref().map_or(false, |v| v != "none")
    }

    /// Carries audio but no video
    pub fn is_audio_stream(&self) -> bool {
        !self.has_video() && self.acodec.as_deref().map_or(false, |a| a != "none" && !a.is_empty())
    }
}

/// Media metadata with all formats
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    pub id: String,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    /// Duration in seconds
    pub duration: Option<f64>,
    pub webpage_url: Option<String>,
    pub formats: Vec<ExtendedFormat>,
}

/// Trait for info extractors
#[async_trait]
pub trait InfoExtractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Run one extraction attempt. `Ok(None)` means the engine finished
    /// without producing metadata.
    async fn extract(
        &self,
        url: &str,
        strategy: &Strategy,
    ) -> Result<Option<MediaInfo>, DownloadError>;
}
