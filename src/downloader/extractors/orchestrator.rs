// Strategy orchestrator - ordered extraction attempts with fallback
//
// Order:
// 1. tv_embedded without cookies (most permissive, no credential exposure)
// 2. Credentialed clients (ios, android) when a cookies file is configured
// 3. Engine default client, errors not tolerated so the real failure surfaces
//
// DNS failures and a missing engine abort the sequence immediately.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::diagnostics::diagnose_error;
use super::traits::{InfoExtractor, MediaInfo, Strategy};
use crate::downloader::errors::DownloadError;

/// Client identity tried first, without credentials
pub const UNAUTHENTICATED_CLIENT: &str = "tv_embedded";

/// Client identities tried with credentials, in order
pub const AUTHENTICATED_CLIENTS: &[&str] = &["ios", "android"];

/// Successful extraction and the strategy that produced it
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub info: MediaInfo,
    pub strategy: Strategy,
    /// 1-based attempt number
    pub attempt: usize,
}

/// Strategy summary returned to HTTP clients
#[derive(Debug, Clone, Serialize)]
pub struct StrategySummary {
    pub attempt: usize,
    pub client: String,
    pub cookies: bool,
}

impl From<&StrategyOutcome> for StrategySummary {
    fn from(outcome: &StrategyOutcome) -> Self {
        Self {
            attempt: outcome.attempt,
            client: outcome.strategy.client_label().to_string(),
            cookies: outcome.strategy.use_cookies,
        }
    }
}

/// Runs the strategy plan against an extractor
pub struct StrategyRunner {
    extractor: Arc<dyn InfoExtractor>,
    cookies_path: Option<PathBuf>,
}

impl StrategyRunner {
    pub fn new(extractor: Arc<dyn InfoExtractor>, cookies_path: Option<PathBuf>) -> Self {
        Self {
            extractor,
            cookies_path,
        }
    }

    /// Build the ordered strategy list for the current credential situation
    pub fn plan(&self) -> Vec<Strategy> {
        let mut strategies = vec![Strategy::new(Some(UNAUTHENTICATED_CLIENT), false, true)];

        if self.cookies_path.is_some() {
            for client in AUTHENTICATED_CLIENTS {
                strategies.push(Strategy::new(Some(client), true, true));
            }
        }

        strategies.push(Strategy::new(None, false, false));
        strategies
    }

    /// Try each strategy in order until one yields metadata
    pub async fn run(&self, url: &str) -> Result<StrategyOutcome, DownloadError> {
        let strategies = self.plan();
        let total = strategies.len();
        let mut last_error: Option<DownloadError> = None;

        for (idx, strategy) in strategies.into_iter().enumerate() {
            let attempt = idx + 1;
            info!(
                attempt,
                total,
                extractor = self.extractor.name(),
                "extraction attempt: {}",
                strategy
            );

            match self.extractor.extract(url, &strategy).await {
                Ok(Some(info)) => {
                    info!(attempt, "extraction succeeded with {}", strategy);
                    return Ok(StrategyOutcome {
                        info,
                        strategy,
                        attempt,
                    });
                }
                Ok(None) => {
                    warn!(attempt, "strategy returned no metadata, trying next");
                }
                Err(e) if e.is_fatal_for_extraction() => {
                    warn!(attempt, error = %e, "aborting extraction");
                    return Err(e);
                }
                Err(e) => {
                    let message = e.to_string();
                    let reason = diagnose_error(&message);
                    warn!(
                        attempt,
                        reason = reason.map(|r| r.description()).unwrap_or("none"),
                        "strategy failed: {}",
                        truncate(&message, 200)
                    );
                    match reason {
                        Some(r) if r.is_permanent() => {
                            info!("{} is usually permanent, remaining strategies may fail too", r.description());
                        }
                        Some(r) if r.cookies_might_help() && self.cookies_path.is_none() => {
                            info!("a cookies file might help with: {}", r.description());
                        }
                        _ => {}
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(DownloadError::ExtractionExhausted(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no strategy returned metadata".to_string()),
        ))
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
