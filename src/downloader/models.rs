// Common data models for jobs and format options

use serde::{Serialize, Serializer};
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Synthetic format id for the "best audio transcoded to MP3" option
pub const AUDIO_FORMAT_ID: &str = "best_audio_mp3";

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Downloading,
    Merging,
    Ready,
    Error,
}

impl JobStatus {
    /// No further progress updates are accepted once terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }
}

/// Tracked state of one download job
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub percent: f32,
    pub status: JobStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Server-side artifact location, never sent to clients
    #[serde(skip)]
    pub path: Option<PathBuf>,
    #[serde(serialize_with = "rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(serialize_with = "rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Job {
    pub fn queued() -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            percent: 0.0,
            status: JobStatus::Downloading,
            message: "Queued".to_string(),
            filename: None,
            path: None,
            created_at: now,
            updated_at: now,
        }
    }
}

fn rfc3339<S: Serializer>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    let text = value
        .format(&Rfc3339)
        .map_err(<S::Error as serde::ser::Error>::custom)?;
    serializer.serialize_str(&text)
}

/// What the user picked on the format list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatSelection {
    /// Best available audio, transcoded to MP3
    Audio,
    /// Explicit video format muxed with the best compatible audio into MP4
    Video { format_id: String },
}

impl FormatSelection {
    pub fn from_format_id(format_id: &str) -> Self {
        if format_id == AUDIO_FORMAT_ID {
            Self::Audio
        } else {
            Self::Video {
                format_id: format_id.to_string(),
            }
        }
    }

    /// Extension of the final artifact
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Audio => "mp3",
            Self::Video { .. } => "mp4",
        }
    }

    /// Video jobs download a second (audio) stream before merging
    pub fn has_secondary_stream(&self) -> bool {
        matches!(self, Self::Video { .. })
    }

    /// yt-dlp format expression
    pub fn format_expression(&self) -> String {
        match self {
            Self::Audio => "bestaudio/best".to_string(),
            // Prefer m4a (AAC) audio so the mp4 plays everywhere
            Self::Video { format_id } => format!("{}+bestaudio[ext=m4a]/bestaudio/best", format_id),
        }
    }
}

/// Audio transcode postprocessing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTranscode {
    pub codec: String,
    pub quality: String,
}

impl Default for AudioTranscode {
    fn default() -> Self {
        Self {
            codec: "mp3".to_string(),
            quality: "192".to_string(),
        }
    }
}

/// A job accepted by the coordinator, waiting for a worker
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub id: String,
    pub url: String,
    pub selection: FormatSelection,
    pub clients: Vec<String>,
    pub cookies_path: Option<PathBuf>,
}

/// Declarative options handed to the download backend
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub job_id: String,
    pub url: String,
    /// Format expression (e.g. "137+bestaudio[ext=m4a]/bestaudio/best")
    pub format: String,
    pub output_dir: PathBuf,
    /// Output template bound to the job id, e.g. "/tmp/downloads/<id>.%(ext)s"
    pub output_template: String,
    pub merge_output_format: Option<String>,
    pub audio: Option<AudioTranscode>,
    pub clients: Vec<String>,
    pub cookies_path: Option<PathBuf>,
    pub retries: u32,
}

impl DownloadRequest {
    pub fn for_job(job: &DownloadJob, output_dir: PathBuf, retries: u32) -> Self {
        let output_template = output_dir
            .join(format!("{}.%(ext)s", job.id))
            .to_string_lossy()
            .to_string();

        let (merge_output_format, audio) = match job.selection {
            FormatSelection::Audio => (None, Some(AudioTranscode::default())),
            FormatSelection::Video { .. } => (Some("mp4".to_string()), None),
        };

        Self {
            job_id: job.id.clone(),
            url: job.url.clone(),
            format: job.selection.format_expression(),
            output_dir,
            output_template,
            merge_output_format,
            audio,
            clients: job.clients.clone(),
            cookies_path: job.cookies_path.clone(),
            retries,
        }
    }
}

/// Result reported by the backend once the engine exits successfully
#[derive(Debug, Clone, Default)]
pub struct DownloadOutcome {
    pub title: Option<String>,
}

/// One selectable download target
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FormatOption {
    pub format_id: String,
    pub extension: String,
    pub resolution: String,
    /// Approximate total size in bytes
    pub filesize: Option<u64>,
    pub filesize_str: String,
    pub label: String,
    pub is_video: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tbr: Option<f32>,
}

/// Video and audio option lists derived from raw formats
#[derive(Debug, Clone, Serialize)]
pub struct FormatListing {
    pub videos: Vec<FormatOption>,
    pub audios: Vec<FormatOption>,
}
