// Per-job progress tracker
//
// Maps engine events onto one overall percentage:
//   primary stream   0..70
//   secondary stream 70..90 (video jobs only)
//   merge/transcode  90
// Finalization (100, ready) belongs to the job runner.

use std::sync::Arc;

use async_trait::async_trait;

use super::models::{FormatSelection, JobStatus};
use super::store::ProgressStore;
use super::traits::{EngineEvent, ProgressHook};

const PRIMARY_WEIGHT: f32 = 0.7;
const SECONDARY_BASE: f32 = 70.0;
const SECONDARY_WEIGHT: f32 = 0.2;
const MERGE_PERCENT: f32 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Primary,
    Secondary,
    Merging,
    Done,
}

pub struct ProgressTracker {
    store: Arc<ProgressStore>,
    job_id: String,
    selection: FormatSelection,
    phase: Phase,
    streams_started: u32,
}

impl ProgressTracker {
    pub fn new(store: Arc<ProgressStore>, job_id: &str, selection: FormatSelection) -> Self {
        Self {
            store,
            job_id: job_id.to_string(),
            selection,
            phase: Phase::Primary,
            streams_started: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Stop reacting to engine events
    pub fn finish(&mut self) {
        self.phase = Phase::Done;
    }

    fn primary_label(&self) -> &'static str {
        if self.selection.has_secondary_stream() {
            "Downloading video"
        } else {
            "Downloading audio"
        }
    }

    fn merge_message(&self) -> &'static str {
        if self.selection.has_secondary_stream() {
            "Merging video and audio..."
        } else {
            "Converting to MP3..."
        }
    }

    async fn enter_merging(&mut self) {
        self.phase = Phase::Merging;
        self.store
            .update_progress(
                &self.job_id,
                MERGE_PERCENT,
                JobStatus::Merging,
                self.merge_message(),
            )
            .await;
    }

    async fn on_stream_started(&mut self) {
        self.streams_started += 1;
        if self.streams_started == 1 {
            return;
        }

        match self.phase {
            Phase::Primary if self.selection.has_secondary_stream() => {
                self.phase = Phase::Secondary;
                self.store
                    .update_progress(
                        &self.job_id,
                        SECONDARY_BASE,
                        JobStatus::Downloading,
                        "Downloading audio",
                    )
                    .await;
            }
            Phase::Primary | Phase::Secondary => self.enter_merging().await,
            Phase::Merging | Phase::Done => {}
        }
    }

    async fn on_progress(&mut self, percent: f32) {
        let percent = percent.clamp(0.0, 100.0);
        let (overall, message) = match self.phase {
            Phase::Primary => (
                percent * PRIMARY_WEIGHT,
                format!("{}: {:.1}%", self.primary_label(), percent),
            ),
            Phase::Secondary => (
                SECONDARY_BASE + percent * SECONDARY_WEIGHT,
                format!("Downloading audio: {:.1}%", percent),
            ),
            Phase::Merging | Phase::Done => return,
        };

        self.store
            .update_progress(&self.job_id, overall, JobStatus::Downloading, &message)
            .await;
    }
}

#[async_trait]
impl ProgressHook for ProgressTracker {
    async fn on_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::StreamStarted => self.on_stream_started().await,
            EngineEvent::Progress(p) => self.on_progress(p).await,
            EngineEvent::PostProcessing => {
                if matches!(self.phase, Phase::Primary | Phase::Secondary) {
                    self.enter_merging().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn tracker(selection: FormatSelection) -> (Arc<ProgressStore>, ProgressTracker) {
        let store = ProgressStore::new();
        store.create("job").await;
        let tracker = ProgressTracker::new(store.clone(), "job", selection);
        (store, tracker)
    }

    fn video() -> FormatSelection {
        FormatSelection::Video {
            format_id: "137".to_string(),
        }
    }

    #[tokio::test]
    async fn test_video_phases() {
        let (store, mut t) = tracker(video()).await;

        t.on_event(EngineEvent::StreamStarted).await;
        t.on_event(EngineEvent::Progress(50.0)).await;
        assert_eq!(store.get("job").await.unwrap().percent, 35.0);
        assert_eq!(t.phase(), Phase::Primary);

        t.on_event(EngineEvent::Progress(100.0)).await;
        t.on_event(EngineEvent::StreamStarted).await;
        assert_eq!(t.phase(), Phase::Secondary);

        t.on_event(EngineEvent::Progress(50.0)).await;
        let job = store.get("job").await.unwrap();
        assert_eq!(job.percent, 80.0);
        assert_eq!(job.message, "Downloading audio: 50.0%");

        t.on_event(EngineEvent::PostProcessing).await;
        let job = store.get("job").await.unwrap();
        assert_eq!(t.phase(), Phase::Merging);
        assert_eq!(job.percent, 90.0);
        assert_eq!(job.status, JobStatus::Merging);
        assert_eq!(job.message, "Merging video and audio...");
    }

    #[tokio::test]
    async fn test_secondary_restart_does_not_go_backwards() {
        let (store, mut t) = tracker(video()).await;

        t.on_event(EngineEvent::StreamStarted).await;
        t.on_event(EngineEvent::Progress(100.0)).await;
        t.on_event(EngineEvent::StreamStarted).await;
        t.on_event(EngineEvent::Progress(0.0)).await;

        assert_eq!(store.get("job").await.unwrap().percent, 70.0);
    }

    #[tokio::test]
    async fn test_audio_second_stream_goes_to_merging() {
        let (store, mut t) = tracker(FormatSelection::Audio).await;

        t.on_event(EngineEvent::StreamStarted).await;
        t.on_event(EngineEvent::Progress(20.0)).await;
        assert_eq!(
            store.get("job").await.unwrap().message,
            "Downloading audio: 20.0%"
        );

        t.on_event(EngineEvent::StreamStarted).await;
        let job = store.get("job").await.unwrap();
        assert_eq!(t.phase(), Phase::Merging);
        assert_eq!(job.message, "Converting to MP3...");
    }

    #[tokio::test]
    async fn test_progress_ignored_after_merge() {
        let (store, mut t) = tracker(video()).await;

        t.on_event(EngineEvent::PostProcessing).await;
        t.on_event(EngineEvent::Progress(10.0)).await;

        let job = store.get("job").await.unwrap();
        assert_eq!(job.percent, 90.0);
        assert_eq!(job.status, JobStatus::Merging);
    }
}
