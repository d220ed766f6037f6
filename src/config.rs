// Runtime configuration from environment variables

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::downloader::DEFAULT_CLIENTS;

const APP_DIR_NAME: &str = "media-download-proxy";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub download_dir: PathBuf,
    pub cookies_path: Option<PathBuf>,
    /// Explicit yt-dlp binary; auto-detected when unset
    pub ytdlp_path: Option<String>,
    pub proxy: Option<String>,
    pub default_clients: Vec<String>,
    pub max_concurrent_downloads: usize,
    pub queue_capacity: usize,
    pub download_retries: u32,
    pub socket_timeout_secs: u64,
    pub extract_timeout_secs: u64,
    pub job_timeout: Duration,
    pub job_max_age: Duration,
    pub sweep_interval: Duration,
    pub handoff_grace: Duration,
    pub resolve_redirects: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            download_dir: std::env::temp_dir().join("downloads"),
            cookies_path: None,
            ytdlp_path: None,
            proxy: None,
            default_clients: DEFAULT_CLIENTS.iter().map(|c| c.to_string()).collect(),
            max_concurrent_downloads: 3,
            queue_capacity: 32,
            download_retries: 10,
            socket_timeout_secs: 20,
            extract_timeout_secs: 90,
            job_timeout: Duration::from_secs(2 * 60 * 60),
            job_max_age: Duration::from_secs(6 * 60 * 60),
            sweep_interval: Duration::from_secs(300),
            handoff_grace: Duration::from_secs(60),
            resolve_redirects: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut config = Self::from_lookup(|name| std::env::var(name).ok());
        config.cookies_path = discover_cookies(
            config.cookies_path.take(),
            &cookie_candidates(),
            std::env::var("YOUTUBE_COOKIES").ok(),
        );
        config
    }

    /// Build from an arbitrary variable source. Credentials discovery on
    /// disk is left to `from_env`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |name: &str| lookup(name).and_then(|v| non_empty(&v).map(str::to_string));
        let number = |name: &str| text(name).and_then(|v| v.parse::<u64>().ok());
        let secs = |name: &str, default: Duration| {
            number(name).map(Duration::from_secs).unwrap_or(default)
        };

        let bind_addr = text("APP_ADDR")
            .or_else(|| {
                text("PORT")
                    .and_then(|p| p.parse::<u16>().ok())
                    .map(|port| format!("0.0.0.0:{}", port))
            })
            .unwrap_or(defaults.bind_addr);

        let default_clients = text("DEFAULT_CLIENTS")
            .map(|raw| crate::downloader::coordinator::parse_client_list(&raw))
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.default_clients);

        Self {
            bind_addr,
            download_dir: text("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
            cookies_path: text("COOKIES_FILE").map(PathBuf::from),
            ytdlp_path: text("YTDLP_PATH"),
            proxy: text("YTDLP_PROXY"),
            default_clients,
            max_concurrent_downloads: number("MAX_CONCURRENT_DOWNLOADS")
                .filter(|n| *n > 0)
                .map(|n| n as usize)
                .unwrap_or(defaults.max_concurrent_downloads),
            queue_capacity: number("QUEUE_CAPACITY")
                .filter(|n| *n > 0)
                .map(|n| n as usize)
                .unwrap_or(defaults.queue_capacity),
            download_retries: number("DOWNLOAD_RETRIES")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.download_retries),
            socket_timeout_secs: number("SOCKET_TIMEOUT_SECS")
                .unwrap_or(defaults.socket_timeout_secs),
            extract_timeout_secs: number("EXTRACT_TIMEOUT_SECS")
                .unwrap_or(defaults.extract_timeout_secs),
            job_timeout: secs("JOB_TIMEOUT_SECS", defaults.job_timeout),
            job_max_age: secs("JOB_MAX_AGE_SECS", defaults.job_max_age),
            sweep_interval: secs("SWEEP_INTERVAL_SECS", defaults.sweep_interval),
            handoff_grace: secs("HANDOFF_GRACE_SECS", defaults.handoff_grace),
            resolve_redirects: text("RESOLVE_REDIRECTS")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.resolve_redirects),
        }
    }
}

/// Well-known credentials file locations, in lookup order
fn cookie_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from("COOKIES.txt")];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join(APP_DIR_NAME).join("cookies.txt"));
    }
    candidates
}

/// Pick the credentials file: explicit path, then well-known files, then
/// inline content written to a temp file.
pub fn discover_cookies(
    explicit: Option<PathBuf>,
    candidates: &[PathBuf],
    inline: Option<String>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            info!(path = %path.display(), "using configured cookies file");
            return Some(path);
        }
        warn!(path = %path.display(), "configured cookies file does not exist");
    }

    if let Some(path) = candidates.iter().find(|p| p.is_file()) {
        info!(path = %path.display(), "using cookies file");
        return Some(path.clone());
    }

    let content = inline.filter(|c| !c.trim().is_empty())?;
    let path = std::env::temp_dir().join(format!("{}-cookies.txt", APP_DIR_NAME));
    match write_cookies(&path, &content) {
        Ok(()) => {
            info!(path = %path.display(), "cookies loaded from environment");
            Some(path)
        }
        Err(e) => {
            warn!(error = %e, "failed to write cookies from environment");
            None
        }
    }
}

fn write_cookies(path: &Path, content: &str) -> std::io::Result<()> {
    std::fs::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);

        assert_eq!(config.bind_addr, "127.0.0.1:8000");
        assert_eq!(config.default_clients, vec!["tv_embedded", "android", "web"]);
        assert_eq!(config.max_concurrent_downloads, 3);
        assert_eq!(config.download_retries, 10);
        assert_eq!(config.handoff_grace, Duration::from_secs(60));
        assert!(config.resolve_redirects);
        assert!(config.cookies_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("DEFAULT_CLIENTS", "ios, web"),
            ("MAX_CONCURRENT_DOWNLOADS", "0"),
            ("JOB_TIMEOUT_SECS", "30"),
            ("RESOLVE_REDIRECTS", "off"),
            ("YTDLP_PROXY", "  "),
        ]);

        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.default_clients, vec!["ios", "web"]);
        // Zero workers would stall every job
        assert_eq!(config.max_concurrent_downloads, 3);
        assert_eq!(config.job_timeout, Duration::from_secs(30));
        assert!(!config.resolve_redirects);
        assert!(config.proxy.is_none());
    }

    #[test]
    fn test_app_addr_beats_port() {
        let config = config_from(&[("APP_ADDR", "10.0.0.1:1234"), ("PORT", "9000")]);
        assert_eq!(config.bind_addr, "10.0.0.1:1234");
    }

    #[test]
    fn test_discover_cookies_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.txt");
        let second = dir.path().join("b.txt");
        std::fs::write(&second, "# Netscape").unwrap();

        let found = discover_cookies(
            Some(dir.path().join("missing.txt")),
            &[first.clone(), second.clone()],
            Some("inline".to_string()),
        );
        assert_eq!(found, Some(second.clone()));

        std::fs::write(&first, "# Netscape").unwrap();
        let found = discover_cookies(Some(second.clone()), &[first], None);
        assert_eq!(found, Some(second));
    }

    #[test]
    fn test_discover_cookies_none() {
        assert_eq!(discover_cookies(None, &[], None), None);
        assert_eq!(discover_cookies(None, &[], Some("  ".to_string())), None);
    }
}
