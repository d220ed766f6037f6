// Downloader backend trait and progress hook definitions

use async_trait::async_trait;

use super::errors::DownloadError;
use super::models::{DownloadOutcome, DownloadRequest};

/// Events a backend reports while the engine runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    /// A new stream started downloading (video, then audio for muxed jobs)
    StreamStarted,
    /// Download progress of the current stream, 0-100
    Progress(f32),
    /// Merging or transcoding began
    PostProcessing,
}

/// Receives engine events for one job
#[async_trait]
pub trait ProgressHook: Send {
    async fn on_event(&mut self, event: EngineEvent);
}

/// Trait for downloader backend implementations
#[async_trait]
pub trait DownloaderBackend: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Download with progress updates. Output files land in
    /// `request.output_dir` named after the job id.
    async fn download(
        &self,
        request: &DownloadRequest,
        hook: &mut dyn ProgressHook,
    ) -> Result<DownloadOutcome, DownloadError>;
}
