// Job runner - executes one download job end to end
//
// Drives the backend with a per-job tracker, locates the produced file and
// records the final state. Nothing is returned to the caller; every outcome
// lands in the progress store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::errors::DownloadError;
use super::models::{DownloadJob, DownloadRequest};
use super::store::ProgressStore;
use super::tracker::ProgressTracker;
use super::traits::DownloaderBackend;
use super::utils::{find_job_output, remove_job_files, sanitize_title, truncate_message};

/// Error messages recorded in the store are cut to this many characters
pub const MAX_ERROR_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub output_dir: PathBuf,
    pub retries: u32,
    pub job_timeout: Duration,
}

pub struct JobRunner {
    backend: Arc<dyn DownloaderBackend>,
    store: Arc<ProgressStore>,
    settings: RunnerSettings,
}

impl JobRunner {
    pub fn new(
        backend: Arc<dyn DownloaderBackend>,
        store: Arc<ProgressStore>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            backend,
            store,
            settings,
        }
    }

    /// Execute a job in a child task so a panic is recorded as a job failure
    pub async fn run_supervised(self: Arc<Self>, job: DownloadJob) {
        let id = job.id.clone();
        let runner = self.clone();
        if let Err(e) = tokio::spawn(async move { runner.run(job).await }).await {
            error!(job_id = %id, error = %e, "job task aborted");
            self.fail(&id, &format!("internal failure: {}", e)).await;
        }
    }

    pub async fn run(&self, job: DownloadJob) {
        info!(
            job_id = %job.id,
            backend = self.backend.name(),
            format = %job.selection.format_expression(),
            "starting job"
        );

        match self.execute(&job).await {
            Ok((filename, path)) => {
                if self.store.mark_ready(&job.id, filename.clone(), path).await {
                    info!(job_id = %job.id, filename = %filename, "job ready");
                } else {
                    // Retired while running; nobody will fetch the file
                    warn!(job_id = %job.id, "job finished after retirement, discarding output");
                    remove_job_files(&self.settings.output_dir, &job.id).await;
                }
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "job failed");
                self.fail(&job.id, &e.to_string()).await;
            }
        }
    }

    async fn execute(&self, job: &DownloadJob) -> Result<(String, PathBuf), DownloadError> {
        let request = DownloadRequest::for_job(
            job,
            self.settings.output_dir.clone(),
            self.settings.retries,
        );
        let mut tracker = ProgressTracker::new(self.store.clone(), &job.id, job.selection.clone());

        let outcome = tokio::time::timeout(
            self.settings.job_timeout,
            self.backend.download(&request, &mut tracker),
        )
        .await
        .map_err(|_| {
            DownloadError::NetworkTimeout(format!(
                "job exceeded {}s",
                self.settings.job_timeout.as_secs()
            ))
        })??;
        tracker.finish();

        let path = find_job_output(
            &self.settings.output_dir,
            &job.id,
            job.selection.extension(),
        )
        .await
        .ok_or_else(|| {
            DownloadError::ExecutionError(
                "Download finished but no output file was produced".to_string(),
            )
        })?;

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| job.selection.extension().to_string());
        let title = sanitize_title(outcome.title.as_deref().unwrap_or_default());

        Ok((format!("{}.{}", title, ext), path))
    }

    async fn fail(&self, id: &str, message: &str) {
        self.store
            .mark_failed(id, &truncate_message(message, MAX_ERROR_CHARS))
            .await;
        let removed = remove_job_files(&self.settings.output_dir, id).await;
        if removed > 0 {
            info!(job_id = id, removed, "removed partial files");
        }
    }
}
