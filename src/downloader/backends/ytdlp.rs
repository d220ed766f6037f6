// yt-dlp backend - metadata extraction and downloads through the yt-dlp CLI
//
// Metadata: `--dump-json` under a process timeout, one attempt per strategy.
// Downloads: spawned with `--newline` so every progress update is its own
// stdout line; lines are mapped onto engine events as they arrive.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use crate::downloader::errors::DownloadError;
use crate::downloader::extractors::{ExtendedFormat, InfoExtractor, MediaInfo, Strategy};
use crate::downloader::models::{DownloadOutcome, DownloadRequest};
use crate::downloader::traits::{DownloaderBackend, EngineEvent, ProgressHook};
use crate::downloader::utils::{run_output_with_timeout, spawn_error};

/// Browser identity presented to source sites
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Keep at most this much stderr for error classification
const STDERR_LIMIT: usize = 64 * 1024;

lazy_static::lazy_static! {
    // [download]  42.3% of ~ 310.04MiB at 374.36KiB/s ETA 11:59 (frag 56/454)
    static ref PROGRESS_RE: Regex = Regex::new(r"^\[download\]\s+(\d+(?:\.\d+)?)%").unwrap();
    static ref DEST_RE: Regex = Regex::new(r"^\[download\]\s+Destination:\s+(.+)").unwrap();
    static ref ALREADY_RE: Regex = Regex::new(r"has already been downloaded").unwrap();
    static ref POSTPROCESS_RE: Regex =
        Regex::new(r"^\[(Merger|ExtractAudio|VideoConvertor|VideoRemuxer)\]").unwrap();
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub ytdlp_path: String,
    pub socket_timeout_secs: u64,
    /// Upper bound for one metadata extraction process
    pub extract_timeout_secs: u64,
    pub proxy: Option<String>,
    pub user_agent: String,
    /// Credentials file for strategies that ask for cookies
    pub cookies_path: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            socket_timeout_secs: 20,
            extract_timeout_secs: 90,
            proxy: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cookies_path: None,
        }
    }
}

pub struct YtDlpBackend {
    settings: EngineSettings,
}

impl YtDlpBackend {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-check-certificates".to_string(),
            "--geo-bypass".to_string(),
            "--socket-timeout".to_string(),
            self.settings.socket_timeout_secs.to_string(),
            "--user-agent".to_string(),
            self.settings.user_agent.clone(),
        ];
        if let Some(proxy) = &self.settings.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }
        args
    }

    fn metadata_args(&self, url: &str, strategy: &Strategy) -> Vec<String> {
        let mut args = vec!["--dump-json".to_string(), "--no-warnings".to_string()];
        args.extend(self.common_args());

        if strategy.ignore_errors {
            args.push("--ignore-errors".to_string());
        }
        if let Some(client) = &strategy.client {
            args.push("--extractor-args".to_string());
            args.push(format!("youtube:player_client={}", client));
        }
        if strategy.use_cookies {
            if let Some(cookies) = &self.settings.cookies_path {
                args.push("--cookies".to_string());
                args.push(cookies.to_string_lossy().to_string());
            }
        }

        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    fn download_args(&self, request: &DownloadRequest) -> Vec<String> {
        let mut args = vec!["--newline".to_string()];
        args.extend(self.common_args());
        args.extend([
            "-f".to_string(),
            request.format.clone(),
            "-o".to_string(),
            request.output_template.clone(),
            "--retries".to_string(),
            request.retries.to_string(),
            "--fragment-retries".to_string(),
            request.retries.to_string(),
            "--write-info-json".to_string(),
        ]);

        if let Some(container) = &request.merge_output_format {
            args.push("--merge-output-format".to_string());
            args.push(container.clone());
        }
        if let Some(audio) = &request.audio {
            args.extend([
                "-x".to_string(),
                "--audio-format".to_string(),
                audio.codec.clone(),
                "--audio-quality".to_string(),
                audio.quality.clone(),
            ]);
        }
        if !request.clients.is_empty() {
            args.push("--extractor-args".to_string());
            args.push(format!("youtube:player_client={}", request.clients.join(",")));
        }
        if let Some(cookies) = &request.cookies_path {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().to_string());
        }

        args.push("--".to_string());
        args.push(request.url.clone());
        args
    }
}

#[async_trait]
impl InfoExtractor for YtDlpBackend {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract(
        &self,
        url: &str,
        strategy: &Strategy,
    ) -> Result<Option<MediaInfo>, DownloadError> {
        let args = self.metadata_args(url, strategy);
        debug!("{} {}", self.settings.ytdlp_path, args.join(" "));

        let output = run_output_with_timeout(
            &self.settings.ytdlp_path,
            args,
            self.settings.extract_timeout_secs,
        )
        .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        // --ignore-errors may still print metadata next to a failing exit code
        if output.status.success() || strategy.ignore_errors {
            if let Some(info) = parse_media_info(&stdout)? {
                return Ok(Some(info));
            }
        }
        if output.status.success() {
            return Ok(None);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let err = DownloadError::classify(&stderr, url);
        if strategy.ignore_errors && !err.is_fatal_for_extraction() {
            warn!(strategy = %strategy, error = %err, "tolerated extraction error");
            return Ok(None);
        }
        Err(err)
    }
}

#[async_trait]
impl DownloaderBackend for YtDlpBackend {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        hook: &mut dyn ProgressHook,
    ) -> Result<DownloadOutcome, DownloadError> {
        let args = self.download_args(request);
        info!(job_id = %request.job_id, "{} {}", self.settings.ytdlp_path, args.join(" "));

        let mut child = TokioCommand::new(&self.settings.ytdlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.settings.ytdlp_path, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stderr".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = (&mut stderr).take(STDERR_LIMIT as u64).read_to_end(&mut buf).await;
            // Keep draining so the child never blocks on a full pipe
            let _ = tokio::io::copy(&mut stderr, &mut tokio::io::sink()).await;
            String::from_utf8_lossy(&buf).to_string()
        });

        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| DownloadError::ExecutionError(format!("Failed to read output: {}", e)))?
        {
            if let Some(event) = parse_progress_line(&line) {
                hook.on_event(event).await;
            } else {
                debug!(job_id = %request.job_id, "{}", line);
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| DownloadError::ExecutionError(format!("Failed to wait for yt-dlp: {}", e)))?;
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(DownloadError::classify(&stderr, &request.url));
        }

        let title = take_info_title(&request.output_dir, &request.job_id).await;
        Ok(DownloadOutcome { title })
    }
}

/// Map one stdout line of a `--newline` download onto an engine event
pub fn parse_progress_line(line: &str) -> Option<EngineEvent> {
    let line = line.trim();

    if DEST_RE.is_match(line) {
        return Some(EngineEvent::StreamStarted);
    }
    if line.starts_with("[download]") && ALREADY_RE.is_match(line) {
        return Some(EngineEvent::Progress(100.0));
    }
    if let Some(caps) = PROGRESS_RE.captures(line) {
        let percent: f32 = caps.get(1)?.as_str().parse().ok()?;
        return Some(EngineEvent::Progress(percent));
    }
    if POSTPROCESS_RE.is_match(line) {
        return Some(EngineEvent::PostProcessing);
    }
    None
}

/// Read the title from `{id}.info.json` and delete the file
async fn take_info_title(dir: &Path, job_id: &str) -> Option<String> {
    let path = dir.join(format!("{}.info.json", job_id));
    let raw = tokio::fs::read(&path).await.ok()?;
    let _ = tokio::fs::remove_file(&path).await;

    let json: Value = serde_json::from_slice(&raw).ok()?;
    json["title"].as_str().map(str::to_string)
}

/// Parse `--dump-json` output. Empty output means no metadata.
pub fn parse_media_info(stdout: &str) -> Result<Option<MediaInfo>, DownloadError> {
    let Some(line) = stdout.lines().map(str::trim).find(|l| l.starts_with('{')) else {
        return Ok(None);
    };

    let json: Value = serde_json::from_str(line)
        .map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))?;

    let formats = match json["formats"].as_array() {
        Some(list) if !list.is_empty() => list.iter().map(parse_format).collect(),
        // Single-file sources: the record itself is the only format
        _ => vec![parse_format(&json)],
    };

    Ok(Some(MediaInfo {
        id: json["id"].as_str().unwrap_or("unknown").to_string(),
        title: json["title"].as_str().map(str::to_string),
        thumbnail: json["thumbnail"].as_str().map(str::to_string),
        duration: json["duration"].as_f64(),
        webpage_url: json["webpage_url"].as_str().map(str::to_string),
        formats,
    }))
}

fn parse_format(f: &Value) -> ExtendedFormat {
    let vcodec = f["vcodec"].as_str().map(|s| s.to_string());
    let acodec = f["acodec"].as_str().map(|s| s.to_string());

    let video_only = vcodec.as_ref().map_or(false, |v| v != "none")
        && acodec.as_ref().map_or(true, |a| a == "none");
    let audio_only = acodec.as_ref().map_or(false, |a| a != "none")
        && vcodec.as_ref().map_or(true, |v| v == "none");

    ExtendedFormat {
        format_id: f["format_id"].as_str().unwrap_or("").to_string(),
        ext: f["ext"].as_str().unwrap_or("").to_string(),
        resolution: f["resolution"].as_str().map(|s| s.to_string()),
        width: f["width"].as_u64().map(|w| w as u32),
        height: f["height"].as_u64().map(|h| h as u32),
        fps: f["fps"].as_f64().map(|fps| fps as f32),
        vcodec,
        acodec,
        filesize: as_bytes(&f["filesize"]),
        filesize_approx: as_bytes(&f["filesize_approx"]),
        tbr: f["tbr"].as_f64().map(|t| t as f32),
        abr: f["abr"].as_f64().map(|a| a as f32),
        format_note: f["format_note"].as_str().map(|s| s.to_string()),
        video_only,
        audio_only,
    }
}

/// Sizes arrive as integers or, for estimates, floats
fn as_bytes(v: &Value) -> Option<u64> {
    v.as_u64()
        .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::{DownloadJob, FormatSelection};

    fn backend() -> YtDlpBackend {
        YtDlpBackend::new(EngineSettings {
            cookies_path: Some(PathBuf::from("/etc/cookies.txt")),
            ..Default::default()
        })
    }

    fn pair(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }

    #[test]
    fn test_parse_progress_lines() {
        assert_eq!(
            parse_progress_line("[download]  12.5% of ~ 310.04MiB at 374.36KiB/s ETA 11:59 (frag 56/454)"),
            Some(EngineEvent::Progress(12.5))
        );
        assert_eq!(
            parse_progress_line("[download] 100% of 3.00MiB in 00:01"),
            Some(EngineEvent::Progress(100.0))
        );
        assert_eq!(
            parse_progress_line("[download] Destination: /tmp/x.f137.mp4"),
            Some(EngineEvent::StreamStarted)
        );
        assert_eq!(
            parse_progress_line("[download] /tmp/x.mp4 has already been downloaded"),
            Some(EngineEvent::Progress(100.0))
        );
        assert_eq!(
            parse_progress_line("[Merger] Merging formats into \"/tmp/x.mp4\""),
            Some(EngineEvent::PostProcessing)
        );
        assert_eq!(
            parse_progress_line("[ExtractAudio] Destination: /tmp/x.mp3"),
            Some(EngineEvent::PostProcessing)
        );
        assert_eq!(parse_progress_line("[youtube] abc: Downloading webpage"), None);
    }

    #[test]
    fn test_metadata_args_follow_strategy() {
        let b = backend();

        let tolerant = b.metadata_args("https://x/v", &Strategy::new(Some("tv_embedded"), false, true));
        assert!(tolerant.contains(&"--ignore-errors".to_string()));
        assert_eq!(
            pair(&tolerant, "--extractor-args").as_deref(),
            Some("youtube:player_client=tv_embedded")
        );
        assert!(!tolerant.contains(&"--cookies".to_string()));
        assert_eq!(tolerant.last().map(String::as_str), Some("https://x/v"));

        let with_cookies = b.metadata_args("https://x/v", &Strategy::new(Some("ios"), true, true));
        assert_eq!(pair(&with_cookies, "--cookies").as_deref(), Some("/etc/cookies.txt"));

        let auto = b.metadata_args("https://x/v", &Strategy::new(None, false, false));
        assert!(!auto.contains(&"--ignore-errors".to_string()));
        assert!(!auto.contains(&"--extractor-args".to_string()));
    }

    #[test]
    fn test_download_args_for_audio_and_video() {
        let b = backend();
        let mut job = DownloadJob {
            id: "j".to_string(),
            url: "https://x/v".to_string(),
            selection: FormatSelection::Audio,
            clients: vec!["tv_embedded".to_string(), "web".to_string()],
            cookies_path: None,
        };

        let audio = b.download_args(&DownloadRequest::for_job(&job, PathBuf::from("/d"), 10));
        assert_eq!(pair(&audio, "-f").as_deref(), Some("bestaudio/best"));
        assert_eq!(pair(&audio, "--audio-format").as_deref(), Some("mp3"));
        assert_eq!(pair(&audio, "--audio-quality").as_deref(), Some("192"));
        assert_eq!(pair(&audio, "-o").as_deref(), Some("/d/j.%(ext)s"));
        assert_eq!(
            pair(&audio, "--extractor-args").as_deref(),
            Some("youtube:player_client=tv_embedded,web")
        );
        assert!(!audio.contains(&"--cookies".to_string()));

        job.selection = FormatSelection::from_format_id("137");
        job.cookies_path = Some(PathBuf::from("/etc/cookies.txt"));
        let video = b.download_args(&DownloadRequest::for_job(&job, PathBuf::from("/d"), 3));
        assert_eq!(pair(&video, "--merge-output-format").as_deref(), Some("mp4"));
        assert_eq!(pair(&video, "--retries").as_deref(), Some("3"));
        assert_eq!(pair(&video, "--cookies").as_deref(), Some("/etc/cookies.txt"));
        assert!(!video.contains(&"-x".to_string()));
    }

    #[test]
    fn test_parse_media_info_with_formats() {
        let stdout = r#"{"id":"abc","title":"Clip","duration":12.5,"formats":[
            {"format_id":"140","ext":"m4a","vcodec":"none","acodec":"mp4a.40.2","filesize":1000},
            {"format_id":"137","ext":"mp4","vcodec":"avc1","acodec":"none","height":1080,"filesize_approx":5000.7}
        ]}"#
        .replace('\n', "");

        let info = parse_media_info(&stdout).unwrap().unwrap();

        assert_eq!(info.id, "abc");
        assert_eq!(info.title.as_deref(), Some("Clip"));
        assert_eq!(info.duration, Some(12.5));
        assert_eq!(info.formats.len(), 2);
        assert!(info.formats[0].audio_only);
        assert!(info.formats[1].video_only);
        assert_eq!(info.formats[1].effective_size(), Some(5000));
    }

    #[test]
    fn test_parse_media_info_without_formats_uses_record() {
        let stdout = r#"{"id":"x","title":"Direct","ext":"mp4","vcodec":"h264","acodec":"aac","height":720,"format_id":"0"}"#;

        let info = parse_media_info(stdout).unwrap().unwrap();

        assert_eq!(info.formats.len(), 1);
        assert_eq!(info.formats[0].height, Some(720));
        assert!(info.formats[0].has_video());
    }

    #[test]
    fn test_parse_media_info_empty_and_invalid() {
        assert!(parse_media_info("").unwrap().is_none());
        assert!(parse_media_info("\n  \n").unwrap().is_none());
        assert!(matches!(
            parse_media_info("{not json"),
            Err(DownloadError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_info_title_is_taken_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("j.info.json"), br#"{"title":"My Clip"}"#).unwrap();

        assert_eq!(take_info_title(dir.path(), "j").await.as_deref(), Some("My Clip"));
        assert!(!dir.path().join("j.info.json").exists());
        assert_eq!(take_info_title(dir.path(), "j").await, None);
    }

    #[tokio::test]
    async fn test_missing_binary_short_circuits() {
        let b = YtDlpBackend::new(EngineSettings {
            ytdlp_path: "/nonexistent/yt-dlp".to_string(),
            ..Default::default()
        });

        let err = b
            .extract("https://x/v", &Strategy::new(Some("tv_embedded"), false, true))
            .await
            .unwrap_err();
        assert!(err.is_fatal_for_extraction());
    }
}
