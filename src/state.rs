// Shared application state wired at startup

use std::sync::Arc;

use crate::config::AppConfig;
use crate::downloader::{
    DownloaderBackend, FileHandoff, InfoExtractor, JobCoordinator, JobQueue, JobRunner,
    PageResolver, ProgressStore, RunnerSettings, StrategyRunner, ToolInfo,
};

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<ProgressStore>,
    pub strategies: StrategyRunner,
    pub coordinator: JobCoordinator,
    pub handoff: FileHandoff,
    pub resolver: Arc<dyn PageResolver>,
    pub tools: Vec<ToolInfo>,
}

impl AppState {
    /// Wire every component and start the worker pool and sweeper.
    /// Must be called inside a tokio runtime.
    pub fn new(
        config: AppConfig,
        extractor: Arc<dyn InfoExtractor>,
        backend: Arc<dyn DownloaderBackend>,
        resolver: Arc<dyn PageResolver>,
        tools: Vec<ToolInfo>,
    ) -> Arc<Self> {
        let store = ProgressStore::new();

        let runner = Arc::new(JobRunner::new(
            backend,
            store.clone(),
            RunnerSettings {
                output_dir: config.download_dir.clone(),
                retries: config.download_retries,
                job_timeout: config.job_timeout,
            },
        ));
        let (queue, _dispatcher) = JobQueue::start(
            runner,
            config.max_concurrent_downloads,
            config.queue_capacity,
        );

        store.clone().spawn_sweeper(
            config.sweep_interval,
            config.job_max_age,
            config.download_dir.clone(),
        );

        let coordinator = JobCoordinator::new(
            store.clone(),
            queue,
            config.default_clients.clone(),
            config.cookies_path.clone(),
        );

        Arc::new(Self {
            strategies: StrategyRunner::new(extractor, config.cookies_path.clone()),
            handoff: FileHandoff::new(store.clone(), config.handoff_grace),
            coordinator,
            store,
            resolver,
            tools,
            config,
        })
    }

    pub fn tool(&self, name: &str) -> Option<&ToolInfo> {
        self.tools.iter().find(|t| t.name == name)
    }
}
