// Helper functions shared by the engine backend, job runner and sweeper

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, SystemTime};

use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::warn;

use super::errors::DownloadError;

/// Engine leftovers that never count as a finished artifact
const TRANSIENT_SUFFIXES: &[&str] = &[".part", ".ytdl", ".info.json", ".temp"];

/// Run command with timeout, collecting stdout and stderr
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, DownloadError> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let mut stdout_pipe = child.stdout.take().ok_or_else(|| {
        DownloadError::ExecutionError(format!("Failed to capture stdout from {}", program))
    })?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| {
        DownloadError::ExecutionError(format!("Failed to capture stderr from {}", program))
    })?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status_res) => {
            let status = status_res.map_err(|e| {
                DownloadError::ExecutionError(format!("Failed to wait for {}: {}", program, e))
            })?;
            let stdout = join_pipe(stdout_task, "stdout").await?;
            let stderr = join_pipe(stderr_task, "stderr").await?;
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(DownloadError::NetworkTimeout(format!(
                "{} timed out after {}s",
                program, timeout_secs
            )))
        }
    }
}

async fn join_pipe(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
    name: &str,
) -> Result<Vec<u8>, DownloadError> {
    task.await
        .map_err(|e| DownloadError::ExecutionError(format!("{} task failed: {}", name, e)))?
        .map_err(|e| DownloadError::ExecutionError(format!("Failed to read {}: {}", name, e)))
}

/// Map a spawn failure; a missing binary is reported as `ToolNotFound`
pub fn spawn_error(program: &str, err: std::io::Error) -> DownloadError {
    if err.kind() == ErrorKind::NotFound {
        DownloadError::ToolNotFound(program.to_string())
    } else {
        DownloadError::ExecutionError(format!("Failed to start {}: {}", program, err))
    }
}

/// Keep alphanumerics, spaces, hyphens and underscores. Falls back to "video".
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let trimmed = cleaned.trim();

    if trimmed.is_empty() {
        "video".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Cut a message to at most `max` characters
pub fn truncate_message(message: &str, max: usize) -> String {
    match message.char_indices().nth(max) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

/// Whether `file_name` belongs to job `id` (`{id}.*`)
fn belongs_to_job(file_name: &str, id: &str) -> bool {
    file_name
        .strip_prefix(id)
        .map_or(false, |rest| rest.starts_with('.'))
}

fn is_transient(file_name: &str) -> bool {
    TRANSIENT_SUFFIXES.iter().any(|s| file_name.ends_with(s)) || file_name.contains(".part-Frag")
}

async fn job_files(dir: &Path, id: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return files;
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if belongs_to_job(&name, id) {
            files.push(entry.path());
        }
    }
    files.sort();
    files
}

/// Locate the finished artifact of a job. The expected `{id}.{ext}` wins;
/// otherwise any non-transient `{id}.*` file is adopted with its own extension.
pub async fn find_job_output(dir: &Path, id: &str, expected_ext: &str) -> Option<PathBuf> {
    let expected = dir.join(format!("{}.{}", id, expected_ext));
    if tokio::fs::metadata(&expected)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
    {
        return Some(expected);
    }

    job_files(dir, id).await.into_iter().find(|path| {
        path.file_name()
            .map(|n| !is_transient(&n.to_string_lossy()))
            .unwrap_or(false)
    })
}

/// Delete every `{id}.*` file in `dir`. Returns the number of files removed.
pub async fn remove_job_files(dir: &Path, id: &str) -> usize {
    let mut removed = 0;
    for path in job_files(dir, id).await {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove job file"),
        }
    }
    removed
}

/// Remove files left by an earlier process: stem is a job id (UUID) and the
/// file is older than `max_age`.
pub async fn purge_stale_files(dir: &Path, max_age: Duration) -> usize {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return 0;
    };
    let now = SystemTime::now();
    let mut removed = 0;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let stem = name.split('.').next().unwrap_or_default();
        if uuid::Uuid::parse_str(stem).is_err() {
            continue;
        }

        let age = entry
            .metadata()
            .await
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if !matches!(age, Some(age) if age >= max_age) {
            continue;
        }

        if tokio::fs::remove_file(entry.path()).await.is_ok() {
            removed += 1;
        }
    }
    removed
}
