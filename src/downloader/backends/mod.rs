// Downloader backends

pub mod ytdlp;

pub use ytdlp::{EngineSettings, YtDlpBackend, DEFAULT_USER_AGENT};
