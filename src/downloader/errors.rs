// Error types for the extraction engine, job queue and file handoff

use thiserror::Error;

use super::extractors::{diagnose_error, is_name_resolution_error};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// Required request input is missing or blank
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// DNS/connectivity failure towards the source domain
    #[error("The server cannot connect to '{domain}'. This domain may be blocked or unreachable.")]
    NetworkUnreachable { domain: String },

    /// Network or process timeout while talking to the source
    #[error("Network timeout: {0}")]
    NetworkTimeout(String),

    /// yt-dlp or ffmpeg not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Failed to parse yt-dlp JSON output
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Command execution failed
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Every extraction strategy was tried and none produced metadata
    #[error("Could not extract video information: {0}")]
    ExtractionExhausted(String),

    /// Admission queue is at capacity
    #[error("Too many downloads in progress, try again later")]
    QueueFull,
}

impl DownloadError {
    /// Classify engine stderr output. `url` is only used to name the failing
    /// host for name-resolution errors.
    pub fn classify(stderr: &str, url: &str) -> Self {
        if is_name_resolution_error(stderr) {
            return Self::NetworkUnreachable {
                domain: host_of(url),
            };
        }

        let lower = stderr.to_lowercase();

        if lower.contains("timed out") || lower.contains("timeout") {
            return Self::NetworkTimeout(first_error_line(stderr));
        }

        let line = first_error_line(stderr);
        match diagnose_error(stderr) {
            Some(reason) if reason.is_known() => {
                Self::ExecutionError(format!("{} ({})", line, reason.description()))
            }
            _ => Self::ExecutionError(line),
        }
    }

    /// Whether retrying with another strategy cannot help
    pub fn is_fatal_for_extraction(&self) -> bool {
        matches!(self, Self::NetworkUnreachable { .. } | Self::ToolNotFound(_))
    }
}

/// Host part of a URL, or the raw input when it does not parse
pub fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

fn first_error_line(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    lines
        .iter()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

/// Errors surfaced by the one-shot file handoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandoffError {
    /// Job is known but still running or failed; the caller should keep polling
    #[error("File is not ready yet")]
    NotReady,

    /// Unknown job, already delivered, or the file vanished from disk
    #[error("File not found")]
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_failure_names_domain() {
        let stderr = "ERROR: [generic] Unable to download webpage: <urlopen error [Errno -2] \
                      Name or service not known> (caused by TransportError('Failed to resolve'))";
        let err = DownloadError::classify(stderr, "https://blocked.example.org/watch?v=1");
        assert_eq!(
            err,
            DownloadError::NetworkUnreachable {
                domain: "blocked.example.org".to_string()
            }
        );
        assert!(err.is_fatal_for_extraction());
    }

    #[test]
    fn test_generic_error_keeps_error_line() {
        let stderr = "WARNING: something\nERROR: [youtube] abc: Video unavailable\n";
        match DownloadError::classify(stderr, "https://youtube.com/watch?v=abc") {
            DownloadError::ExecutionError(msg) => {
                assert!(msg.starts_with("ERROR: [youtube] abc: Video unavailable"));
                assert!(msg.contains("Video unavailable"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_timeout_is_not_fatal() {
        let err = DownloadError::classify("Read timed out", "https://example.com");
        assert!(matches!(err, DownloadError::NetworkTimeout(_)));
        assert!(!err.is_fatal_for_extraction());
    }

    #[test]
    fn test_missing_file_in_stderr_is_not_engine_missing() {
        // The engine ran; a missing cookies file or output path is an ordinary failure
        let stderr = "ERROR: [Errno 2] No such file or directory: \
                      '/tmp/media-download-proxy-cookies.txt'";
        let err = DownloadError::classify(stderr, "https://example.com/v");
        assert!(matches!(err, DownloadError::ExecutionError(_)));
        assert!(!err.is_fatal_for_extraction());

        let err = DownloadError::classify("sh: ffprobe: command not found", "https://example.com/v");
        assert!(matches!(err, DownloadError::ExecutionError(_)));
        assert!(!err.is_fatal_for_extraction());
    }

    #[test]
    fn test_host_of_falls_back_to_input() {
        assert_eq!(host_of("not a url"), "not a url");
        assert_eq!(host_of("https://www.example.com:8443/x"), "www.example.com");
    }
}
