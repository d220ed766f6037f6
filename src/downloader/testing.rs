// Scripted engine doubles for unit tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::errors::DownloadError;
use super::extractors::{InfoExtractor, MediaInfo, Strategy};
use super::models::{DownloadOutcome, DownloadRequest};
use super::store::ProgressStore;
use super::traits::{DownloaderBackend, EngineEvent, ProgressHook};

/// Extractor answering attempts from a fixed script, recording each strategy
pub struct ScriptedExtractor {
    answers: Mutex<VecDeque<Result<Option<MediaInfo>, DownloadError>>>,
    seen: Mutex<Vec<Strategy>>,
}

impl ScriptedExtractor {
    pub fn new(answers: Vec<Result<Option<MediaInfo>, DownloadError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<Strategy> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl InfoExtractor for ScriptedExtractor {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn extract(
        &self,
        _url: &str,
        strategy: &Strategy,
    ) -> Result<Option<MediaInfo>, DownloadError> {
        self.seen.lock().unwrap().push(strategy.clone());
        self.answers.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }
}

/// What a `MockBackend` does on each download
#[derive(Debug, Clone, Default)]
pub struct MockScript {
    pub events: Vec<EngineEvent>,
    /// Write `{id}.{ext}` on success
    pub output_ext: Option<String>,
    pub title: Option<String>,
    /// Leave a `.part` file behind before anything else happens
    pub partial_file: bool,
    pub error: Option<DownloadError>,
    pub delay: Option<Duration>,
    pub panic: bool,
}

pub struct MockBackend {
    script: MockScript,
    store: Mutex<Option<Arc<ProgressStore>>>,
    percents: Mutex<Vec<f32>>,
    requests: Mutex<Vec<DownloadRequest>>,
}

impl MockBackend {
    pub fn new(script: MockScript) -> Self {
        Self {
            script,
            store: Mutex::new(None),
            percents: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Record the job's stored percent after every emitted event
    pub fn observe(&self, store: Arc<ProgressStore>) {
        *self.store.lock().unwrap() = Some(store);
    }

    pub fn observed_percents(&self) -> Vec<f32> {
        self.percents.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<DownloadRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DownloaderBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        hook: &mut dyn ProgressHook,
    ) -> Result<DownloadOutcome, DownloadError> {
        if self.script.panic {
            panic!("scripted backend panic");
        }
        self.requests.lock().unwrap().push(request.clone());

        let final_ext = if request.audio.is_some() { "mp3" } else { "mp4" };
        if self.script.partial_file {
            let part = request
                .output_dir
                .join(format!("{}.{}.part", request.job_id, final_ext));
            tokio::fs::write(part, b"partial").await.unwrap();
        }

        let store = self.store.lock().unwrap().clone();
        for event in &self.script.events {
            hook.on_event(*event).await;
            if let Some(store) = &store {
                if let Some(job) = store.get(&request.job_id).await {
                    self.percents.lock().unwrap().push(job.percent);
                }
            }
        }

        if let Some(delay) = self.script.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.script.error {
            return Err(err.clone());
        }
        if let Some(ext) = &self.script.output_ext {
            let out = request
                .output_dir
                .join(format!("{}.{}", request.job_id, ext));
            tokio::fs::write(out, b"media").await.unwrap();
        }

        Ok(DownloadOutcome {
            title: self.script.title.clone(),
        })
    }
}
