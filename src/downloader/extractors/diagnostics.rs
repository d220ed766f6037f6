// Error diagnostics - identifies why the extraction engine refused a URL
//
// Analyzes engine stderr to determine:
// - Whether the source domain is unreachable (DNS failure)
// - Type of blocking (403, rate limit, geo, age gate, etc.)

use serde::{Deserialize, Serialize};

/// Substrings the engine and its HTTP stack emit when a host name cannot be resolved
const NAME_RESOLUTION_PATTERNS: &[&str] = &[
    "nameresolutionerror",
    "failed to resolve",
    "no address associated",
    "name or service not known",
    "temporary failure in name resolution",
    "getaddrinfo failed",
    "nodename nor servname provided",
];

/// Check whether an error message describes a DNS/name-resolution failure
pub fn is_name_resolution_error(error: &str) -> bool {
    let lower = error.to_lowercase();
    NAME_RESOLUTION_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Reasons why a source might refuse a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockingReason {
    /// HTTP 403 Forbidden - general access denied
    Http403Forbidden,

    /// Age-restricted content requiring login
    AgeRestricted,

    /// Geographic restriction
    GeoBlocked,

    /// Rate limiting (429 or similar)
    RateLimited,

    /// Bot detection triggered
    BotDetection,

    /// Private video requiring authorization
    PrivateVideo,

    /// Video deleted or unavailable
    VideoUnavailable,

    /// DRM-protected content, cannot be downloaded
    DrmProtected,

    /// Site not handled by the engine
    UnsupportedUrl,

    /// Generic/unknown blocking
    Unknown,
}

impl BlockingReason {
    /// Check if credentials might help
    pub fn cookies_might_help(&self) -> bool {
        matches!(
            self,
            Self::Http403Forbidden | Self::AgeRestricted | Self::BotDetection | Self::PrivateVideo
        )
    }

    /// Check if this is a permanent restriction (no workaround)
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::DrmProtected | Self::VideoUnavailable | Self::UnsupportedUrl
        )
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Http403Forbidden => "Access denied (HTTP 403)",
            Self::AgeRestricted => "Age-restricted content",
            Self::GeoBlocked => "Geographic restriction",
            Self::RateLimited => "Rate limited by the source",
            Self::BotDetection => "Bot detection triggered",
            Self::PrivateVideo => "Private video",
            Self::VideoUnavailable => "Video unavailable",
            Self::DrmProtected => "DRM-protected content",
            Self::UnsupportedUrl => "Unsupported URL",
            Self::Unknown => "Unknown blocking reason",
        }
    }
}

/// Analyze error message and return blocking reason
pub fn diagnose_error(error: &str) -> Option<BlockingReason> {
    let lower = error.to_lowercase();

    // Check patterns in order of specificity

    if lower.contains("drm")
        || lower.contains("widevine")
        || lower.contains("playready")
        || lower.contains("fairplay")
    {
        return Some(BlockingReason::DrmProtected);
    }

    if lower.contains("unsupported url") {
        return Some(BlockingReason::UnsupportedUrl);
    }

    if lower.contains("age-restricted")
        || lower.contains("sign in to confirm your age")
        || lower.contains("age_verification")
    {
        return Some(BlockingReason::AgeRestricted);
    }

    if lower.contains("private video")
        || lower.contains("video is private")
        || lower.contains("sign in if you've been granted access")
    {
        return Some(BlockingReason::PrivateVideo);
    }

    if lower.contains("video unavailable")
        || lower.contains("video has been removed")
        || lower.contains("this video is no longer available")
        || lower.contains("video is unavailable")
    {
        return Some(BlockingReason::VideoUnavailable);
    }

    if lower.contains("not available in your country")
        || lower.contains("blocked in your country")
        || lower.contains("geo restriction")
        || lower.contains("geo-restricted")
    {
        return Some(BlockingReason::GeoBlocked);
    }

    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests") {
        return Some(BlockingReason::RateLimited);
    }

    if lower.contains("confirm you're not a bot")
        || lower.contains("captcha")
        || lower.contains("unusual traffic")
    {
        return Some(BlockingReason::BotDetection);
    }

    if lower.contains("403") || lower.contains("forbidden") {
        return Some(BlockingReason::Http403Forbidden);
    }

    if !error.trim().is_empty() {
        return Some(BlockingReason::Unknown);
    }

    None
}
