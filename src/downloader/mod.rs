// Downloader module - extraction, job execution and progress tracking

pub mod backends;
pub mod coordinator;
pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod handoff;
pub mod models;
pub mod orchestrator;
pub mod queue;
pub mod resolver;
pub mod store;
pub mod tools;
pub mod tracker;
pub mod traits;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use backends::{EngineSettings, YtDlpBackend};
pub use coordinator::{JobCoordinator, SubmitRequest, DEFAULT_CLIENTS};
pub use errors::{DownloadError, HandoffError};
pub use extractors::{InfoExtractor, MediaInfo, StrategyRunner, StrategySummary};
pub use format_selector::FormatSelector;
pub use handoff::{Delivery, FileHandoff};
pub use models::{FormatListing, FormatOption, Job, JobStatus};
pub use orchestrator::{JobRunner, RunnerSettings};
pub use queue::JobQueue;
pub use resolver::{PageResolver, PassthroughResolver, RedirectResolver};
pub use store::ProgressStore;
pub use tools::{ToolInfo, ToolManager, ToolType};
pub use traits::DownloaderBackend;
