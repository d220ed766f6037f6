// HTTP handlers

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::error::ApiError;
use crate::downloader::{FormatOption, FormatSelector, Job, StrategySummary, SubmitRequest};
use crate::state::AppState;

const LANDING_PAGE: &str = include_str!("../../static/index.html");

pub async fn index() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "engine": state.tool("yt-dlp"),
        "ffmpeg": state.tool("ffmpeg"),
        "jobs": state.store.len().await,
        "limits": {
            "max_concurrent_downloads": state.config.max_concurrent_downloads,
            "queue_capacity": state.config.queue_capacity,
            "job_timeout_secs": state.config.job_timeout.as_secs(),
        },
        "cookies": state.config.cookies_path.is_some(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeQuery {
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub title: String,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub videos: Vec<FormatOption>,
    pub audios: Vec<FormatOption>,
    /// URL the engine actually analyzed
    pub url: String,
    pub original_url: String,
    pub strategy: StrategySummary,
}

pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyzeQuery>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let original_url = required(query.url, "url")?;

    let target_url = state.resolver.resolve(&original_url).await;
    info!(url = %original_url, resolved = %target_url, "analyzing");

    let outcome = state.strategies.run(&target_url).await?;
    let listing = FormatSelector::enumerate(&outcome.info.formats);
    let strategy = StrategySummary::from(&outcome);
    let info = outcome.info;

    Ok(Json(AnalyzeResponse {
        title: info.title.unwrap_or_else(|| "Unknown video".to_string()),
        thumbnail: info.thumbnail,
        duration: info.duration,
        videos: listing.videos,
        audios: listing.audios,
        url: target_url,
        original_url,
        strategy,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub url: Option<String>,
    pub format_id: Option<String>,
    pub client: Option<String>,
    #[serde(default)]
    pub use_cookies: bool,
}

#[derive(Debug, Serialize)]
pub struct DownloadAccepted {
    pub file_id: String,
}

pub async fn download_selected(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DownloadQuery>,
) -> Result<Json<DownloadAccepted>, ApiError> {
    let url = required(query.url, "url")?;
    let format_id = required(query.format_id, "format_id")?;

    let file_id = state
        .coordinator
        .submit(SubmitRequest {
            url,
            format_id,
            client: query.client,
            use_cookies: query.use_cookies,
        })
        .await?;

    Ok(Json(DownloadAccepted { file_id }))
}

pub async fn progress(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    state
        .store
        .get(&file_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Job not found"))
}

pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    let delivery = state.handoff.fetch(&file_id).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(delivery.len));
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&delivery.filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    let body = Body::from_stream(delivery.into_stream());
    Ok((headers, body).into_response())
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{} is required", name)))
}

/// `attachment` with an ASCII fallback name and the UTF-8 original
pub fn content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_filename(filename),
        urlencoding::encode(filename)
    )
}

fn ascii_filename(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let compact = sanitized.trim();
    if compact.is_empty() {
        "download.bin".to_string()
    } else {
        compact.to_string()
    }
}
