// Job coordinator - validates download requests and hands them to the queue

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::errors::DownloadError;
use super::models::{DownloadJob, FormatSelection};
use super::queue::JobQueue;
use super::store::ProgressStore;

/// Client identities used when the caller gives no hint
pub const DEFAULT_CLIENTS: &[&str] = &["tv_embedded", "android", "web"];

#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub url: String,
    pub format_id: String,
    /// Comma-separated client identities overriding the defaults
    pub client: Option<String>,
    /// Pass the configured credentials file to the engine
    pub use_cookies: bool,
}

pub struct JobCoordinator {
    store: Arc<ProgressStore>,
    queue: JobQueue,
    default_clients: Vec<String>,
    cookies_path: Option<PathBuf>,
}

impl JobCoordinator {
    pub fn new(
        store: Arc<ProgressStore>,
        queue: JobQueue,
        default_clients: Vec<String>,
        cookies_path: Option<PathBuf>,
    ) -> Self {
        Self {
            store,
            queue,
            default_clients,
            cookies_path,
        }
    }

    /// Accept a download and return its job id. The job runs in the background.
    pub async fn submit(&self, request: SubmitRequest) -> Result<String, DownloadError> {
        let url = request.url.trim();
        let format_id = request.format_id.trim();
        if url.is_empty() {
            return Err(DownloadError::InvalidInput("url is required".to_string()));
        }
        if format_id.is_empty() {
            return Err(DownloadError::InvalidInput(
                "format_id is required".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let clients = self.clients_for(request.client.as_deref());
        let cookies_path = if request.use_cookies {
            self.cookies_path.clone()
        } else {
            None
        };

        let job = DownloadJob {
            id: id.clone(),
            url: url.to_string(),
            selection: FormatSelection::from_format_id(format_id),
            clients,
            cookies_path,
        };

        self.store.create(&id).await;
        if let Err(e) = self.queue.try_enqueue(job) {
            warn!(job_id = %id, "admission queue full, rejecting job");
            self.store.retire(&id).await;
            return Err(e);
        }

        info!(job_id = %id, format_id, url, "job queued");
        Ok(id)
    }

    fn clients_for(&self, hint: Option<&str>) -> Vec<String> {
        let explicit = parse_client_list(hint.unwrap_or_default());
        if explicit.is_empty() {
            self.default_clients.clone()
        } else {
            explicit
        }
    }
}

/// Split a comma-separated client list, dropping blanks
pub fn parse_client_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}
