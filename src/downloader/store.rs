// Progress store - job id -> job state, shared between workers and HTTP handlers
//
// Every transition is applied under a single write lock so readers never see a
// half-written record. Terminal records (ready/error) reject progress updates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::errors::HandoffError;
use super::models::{Job, JobStatus};
use super::utils::remove_job_files;

#[derive(Debug, Default)]
pub struct ProgressStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl ProgressStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a fresh `downloading` record at 0%
    pub async fn create(&self, id: &str) {
        self.jobs.write().await.insert(id.to_string(), Job::queued());
    }

    pub async fn get(&self, id: &str) -> Option<Job> {
        self.jobs.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Apply a progress update. Percent never decreases; terminal jobs are left untouched.
    pub async fn update_progress(&self, id: &str, percent: f32, status: JobStatus, message: &str) {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(id) else {
            return;
        };
        if job.status.is_terminal() || status.is_terminal() {
            return;
        }

        job.percent = job.percent.max(percent.clamp(0.0, 100.0));
        job.status = status;
        job.message = message.to_string();
        job.updated_at = OffsetDateTime::now_utc();
    }

    /// Transition to `ready`, setting filename and path together. Returns false
    /// when the job is unknown or already terminal.
    pub async fn mark_ready(&self, id: &str, filename: String, path: PathBuf) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(id) else {
            return false;
        };
        if job.status.is_terminal() {
            return false;
        }

        job.percent = 100.0;
        job.status = JobStatus::Ready;
        job.message = "Ready".to_string();
        job.filename = Some(filename);
        job.path = Some(path);
        job.updated_at = OffsetDateTime::now_utc();
        true
    }

    /// Transition to `error`. Returns false when the job is unknown or already terminal.
    pub async fn mark_failed(&self, id: &str, message: &str) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(id) else {
            return false;
        };
        if job.status.is_terminal() {
            return false;
        }

        job.status = JobStatus::Error;
        job.message = format!("Error: {}", message);
        job.filename = None;
        job.path = None;
        job.updated_at = OffsetDateTime::now_utc();
        true
    }

    /// Take ownership of a ready job's file, returning its path and the
    /// user-facing filename. The path is cleared so a second claim reports `NotFound`.
    pub async fn claim(&self, id: &str) -> Result<(PathBuf, String), HandoffError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(id).ok_or(HandoffError::NotFound)?;
        if job.status != JobStatus::Ready {
            return Err(HandoffError::NotReady);
        }

        match (job.path.take(), job.filename.clone()) {
            (Some(path), Some(filename)) => {
                job.message = "Delivered".to_string();
                job.updated_at = OffsetDateTime::now_utc();
                Ok((path, filename))
            }
            _ => Err(HandoffError::NotFound),
        }
    }

    /// Remove a job record
    pub async fn retire(&self, id: &str) -> bool {
        self.jobs.write().await.remove(id).is_some()
    }

    /// Retire every record older than `max_age`, whatever its status.
    /// Returns the retired ids.
    pub async fn sweep(&self, max_age: Duration) -> Vec<String> {
        let now = OffsetDateTime::now_utc();
        let max_age = time::Duration::try_from(max_age).unwrap_or(time::Duration::MAX);

        let mut jobs = self.jobs.write().await;
        let expired: Vec<String> = jobs
            .iter()
            .filter(|(_, job)| now - job.created_at >= max_age)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            jobs.remove(id);
        }
        expired
    }

    /// Periodically retire old records and delete whatever files they left behind
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        max_age: Duration,
        download_dir: PathBuf,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let retired = self.sweep(max_age).await;
                if retired.is_empty() {
                    continue;
                }
                info!(count = retired.len(), "sweeper retired expired jobs");
                for id in &retired {
                    purge_files(&download_dir, id).await;
                }
            }
        })
    }
}

async fn purge_files(dir: &Path, id: &str) {
    let removed = remove_job_files(dir, id).await;
    if removed > 0 {
        debug!(job_id = id, removed, "removed leftover files");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_percent_is_monotonic() {
        let store = ProgressStore::new();
        store.create("a").await;

        store.update_progress("a", 40.0, JobStatus::Downloading, "x").await;
        store.update_progress("a", 20.0, JobStatus::Downloading, "y").await;

        let job = store.get("a").await.unwrap();
        assert_eq!(job.percent, 40.0);
        assert_eq!(job.message, "y");
    }

    #[tokio::test]
    async fn test_ready_sets_fields_together() {
        let store = ProgressStore::new();
        store.create("a").await;

        assert!(store.mark_ready("a", "t.mp4".into(), PathBuf::from("/d/a.mp4")).await);
        let job = store.get("a").await.unwrap();
        assert_eq!(job.status, JobStatus::Ready);
        assert_eq!(job.percent, 100.0);
        assert_eq!(job.filename.as_deref(), Some("t.mp4"));
        assert_eq!(job.path, Some(PathBuf::from("/d/a.mp4")));

        // Ready is reachable once
        assert!(!store.mark_ready("a", "other.mp4".into(), PathBuf::from("/d/b.mp4")).await);
        assert!(!store.mark_failed("a", "late failure").await);
    }

    #[tokio::test]
    async fn test_error_is_frozen() {
        let store = ProgressStore::new();
        store.create("a").await;
        store.update_progress("a", 35.0, JobStatus::Downloading, "x").await;

        assert!(store.mark_failed("a", "boom").await);
        store.update_progress("a", 80.0, JobStatus::Merging, "late").await;
        assert!(!store.mark_ready("a", "t.mp4".into(), PathBuf::from("/d/a.mp4")).await);

        let job = store.get("a").await.unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.percent, 35.0);
        assert_eq!(job.message, "Error: boom");
    }

    #[tokio::test]
    async fn test_claim_is_single_shot() {
        let store = ProgressStore::new();
        store.create("a").await;
        assert_eq!(store.claim("a").await, Err(HandoffError::NotReady));

        store.mark_ready("a", "t.mp4".into(), PathBuf::from("/d/a.mp4")).await;
        assert_eq!(
            store.claim("a").await,
            Ok((PathBuf::from("/d/a.mp4"), "t.mp4".to_string()))
        );
        assert_eq!(store.claim("a").await, Err(HandoffError::NotFound));
        assert_eq!(store.claim("missing").await, Err(HandoffError::NotFound));
    }

    #[tokio::test]
    async fn test_sweep_retires_old_entries() {
        let store = ProgressStore::new();
        store.create("old").await;
        store.create("new").await;
        {
            let mut jobs = store.jobs.write().await;
            let old = jobs.get_mut("old").unwrap();
            old.created_at -= time::Duration::hours(10);
        }

        let retired = store.sweep(Duration::from_secs(3600)).await;

        assert_eq!(retired, vec!["old".to_string()]);
        assert!(store.get("old").await.is_none());
        assert!(store.get("new").await.is_some());
    }
}
