pub mod config;
pub mod downloader;
pub mod logging;
pub mod server;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use config::AppConfig;
use downloader::backends::DEFAULT_USER_AGENT;
use downloader::utils::purge_stale_files;
use downloader::{
    EngineSettings, PageResolver, PassthroughResolver, RedirectResolver, ToolManager, ToolType,
    YtDlpBackend,
};
use state::AppState;

/// Start the HTTP server and serve until Ctrl-C
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.download_dir)
        .await
        .with_context(|| format!("creating {}", config.download_dir.display()))?;

    let purged = purge_stale_files(&config.download_dir, config.job_max_age).await;
    if purged > 0 {
        info!(purged, "removed leftovers from a previous run");
    }

    let ytdlp_override = config.ytdlp_path.clone();
    let (tools, ytdlp_path) = tokio::task::spawn_blocking(move || {
        let manager = ToolManager::new(ytdlp_override);
        (manager.get_all_tools(), manager.ytdlp_command())
    })
    .await
    .context("tool detection")?;

    for tool in &tools {
        match (&tool.version, tool.is_available) {
            (Some(version), true) => info!(tool = %tool.name, version = %version, "tool detected"),
            _ if tool.tool_type == ToolType::Ffmpeg => {
                warn!("ffmpeg not found, merging and MP3 conversion will fail")
            }
            _ => warn!(tool = %tool.name, "tool not found, downloads will fail"),
        }
    }

    let backend = Arc::new(YtDlpBackend::new(EngineSettings {
        ytdlp_path,
        socket_timeout_secs: config.socket_timeout_secs,
        extract_timeout_secs: config.extract_timeout_secs,
        proxy: config.proxy.clone(),
        user_agent: DEFAULT_USER_AGENT.to_string(),
        cookies_path: config.cookies_path.clone(),
    }));

    let resolver: Arc<dyn PageResolver> = if config.resolve_redirects {
        Arc::new(RedirectResolver::new(
            DEFAULT_USER_AGENT,
            config.proxy.as_deref(),
            Duration::from_secs(config.socket_timeout_secs),
        )?)
    } else {
        Arc::new(PassthroughResolver)
    };

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, backend.clone(), backend, resolver, tools);
    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    info!("listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
