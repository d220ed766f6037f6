use media_download_proxy::config::AppConfig;
use media_download_proxy::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let config = AppConfig::from_env();
    media_download_proxy::run(config).await
}
