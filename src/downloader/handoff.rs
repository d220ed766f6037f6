// One-shot file handoff
//
// A ready file is claimed from the store exactly once, streamed to the
// caller and deleted when the response body is dropped. The progress entry
// is retired after a short grace window so late polls still see `ready`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use futures_util::{Stream, StreamExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use super::errors::HandoffError;
use super::store::ProgressStore;

pub struct FileHandoff {
    store: Arc<ProgressStore>,
    grace: Duration,
}

/// A claimed file, ready to stream
#[derive(Debug)]
pub struct Delivery {
    pub filename: String,
    pub len: u64,
    file: tokio::fs::File,
    guard: DeleteOnDrop,
}

impl Delivery {
    /// Byte stream of the file. The file is removed once the stream is dropped,
    /// whether it was read to the end or not.
    pub fn into_stream(self) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
        let guard = self.guard;
        ReaderStream::new(self.file).map(move |chunk| {
            let _ = &guard;
            chunk
        })
    }
}

#[derive(Debug)]
struct DeleteOnDrop(PathBuf);

impl Drop for DeleteOnDrop {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => debug!(path = %self.0.display(), "delivered file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.0.display(), error = %e, "failed to remove delivered file"),
        }
    }
}

impl FileHandoff {
    pub fn new(store: Arc<ProgressStore>, grace: Duration) -> Self {
        Self { store, grace }
    }

    pub async fn fetch(&self, id: &str) -> Result<Delivery, HandoffError> {
        let (path, filename) = self.store.claim(id).await?;
        self.schedule_retirement(id);

        let (file, len) = open(&path).await.ok_or(HandoffError::NotFound)?;
        info!(job_id = id, filename = %filename, bytes = len, "delivering file");

        Ok(Delivery {
            filename,
            len,
            file,
            guard: DeleteOnDrop(path),
        })
    }

    fn schedule_retirement(&self, id: &str) {
        let store = self.store.clone();
        let grace = self.grace;
        let id = id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if store.retire(&id).await {
                debug!(job_id = %id, "job retired after delivery");
            }
        });
    }
}

async fn open(path: &Path) -> Option<(tokio::fs::File, u64)> {
    let file = tokio::fs::File::open(path).await.ok()?;
    let meta = file.metadata().await.ok()?;
    meta.is_file().then(|| (file, meta.len()))
}
