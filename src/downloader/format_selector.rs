// FormatSelector - turns raw engine formats into selectable options
//
// Video options: one per height, best candidate first, labelled "{h}p - MP4".
// Audio options: a single synthetic "best audio as MP3" entry.
// Sizes are estimates (video + best audio stream), "N/A" when unknown.

use std::cmp::Ordering;

use super::extractors::ExtendedFormat;
use super::models::{FormatListing, FormatOption, AUDIO_FORMAT_ID};

/// Marker shown when no size information exists
pub const UNKNOWN_SIZE: &str = "N/A";

pub struct FormatSelector;

impl FormatSelector {
    /// Build the video and audio option lists
    pub fn enumerate(formats: &[ExtendedFormat]) -> FormatListing {
        let mut sorted: Vec<&ExtendedFormat> = formats.iter().collect();
        // sort_by is stable, equal keys keep encounter order
        sorted.sort_by(|a, b| {
            Self::quality_key(b)
                .partial_cmp(&Self::quality_key(a))
                .unwrap_or(Ordering::Equal)
        });

        let best_audio = sorted.iter().find(|f| f.is_audio_stream()).copied();
        let audio_size = best_audio.and_then(|a| a.effective_size());

        let mut videos: Vec<FormatOption> = Vec::new();
        for fmt in sorted.iter().filter(|f| f.has_video()) {
            let Some(height) = fmt.height.filter(|h| *h > 0) else {
                continue;
            };
            let resolution = format!("{}p", height);
            if videos.iter().any(|v| v.resolution == resolution) {
                continue;
            }

            let total = fmt.effective_size().map(|v| v + audio_size.unwrap_or(0));
            videos.push(FormatOption {
                format_id: fmt.format_id.clone(),
                extension: "mp4".to_string(),
                label: format!("{} - MP4", resolution),
                resolution,
                filesize: total,
                filesize_str: Self::format_size(total),
                is_video: true,
                tbr: Some(fmt.tbr.unwrap_or(0.0)),
            });
        }
        videos.sort_by_key(|v| std::cmp::Reverse(Self::height_of(v)));

        let audios = vec![FormatOption {
            format_id: AUDIO_FORMAT_ID.to_string(),
            extension: "mp3".to_string(),
            resolution: "Audio High Quality".to_string(),
            filesize: audio_size,
            filesize_str: Self::format_size(audio_size),
            label: "Audio Only - MP3".to_string(),
            is_video: false,
            tbr: None,
        }];

        FormatListing { videos, audios }
    }

    /// (height, tbr, filesize), missing values count as 0
    fn quality_key(f: &ExtendedFormat) -> (u32, f32, u64) {
        (
            f.height.unwrap_or(0),
            f.tbr.unwrap_or(0.0),
            f.filesize.unwrap_or(0),
        )
    }

    fn height_of(option: &FormatOption) -> u32 {
        option
            .resolution
            .trim_end_matches('p')
            .parse()
            .unwrap_or(0)
    }

    /// Human-readable size, base 1024 with one decimal
    pub fn format_size(bytes: Option<u64>) -> String {
        let Some(bytes) = bytes else {
            return UNKNOWN_SIZE.to_string();
        };

        let mut value = bytes as f64;
        for unit in ["B", "KB", "MB", "GB"] {
            if value < 1024.0 {
                return format!("{:.1} {}", value, unit);
            }
            value /= 1024.0;
        }
        format!("{:.1} TB", value)
    }
}
