// Job queue - bounded admission plus a fixed-size worker pool

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::errors::DownloadError;
use super::models::DownloadJob;
use super::orchestrator::JobRunner;

#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<DownloadJob>,
}

impl JobQueue {
    /// Start the dispatcher. At most `workers` jobs run at once; up to
    /// `capacity` more wait in the channel.
    pub fn start(runner: Arc<JobRunner>, workers: usize, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<DownloadJob>(capacity.max(1));
        let permits = Arc::new(Semaphore::new(workers.max(1)));

        let dispatcher = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let Ok(permit) = permits.clone().acquire_owned().await else {
                    break;
                };
                debug!(job_id = %job.id, "dispatching job");
                let runner = runner.clone();
                tokio::spawn(async move {
                    runner.run_supervised(job).await;
                    drop(permit);
                });
            }
            info!("job queue closed");
        });

        (Self { sender }, dispatcher)
    }

    /// Hand a job to the pool without waiting
    pub fn try_enqueue(&self, job: DownloadJob) -> Result<(), DownloadError> {
        self.sender.try_send(job).map_err(|_| DownloadError::QueueFull)
    }
}
