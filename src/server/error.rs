// HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::downloader::{DownloadError, HandoffError};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
    code: &'static str,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            code: "INVALID_INPUT",
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            code: "NOT_FOUND",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            detail: self.message,
            code: self.code,
        });
        (self.status, body).into_response()
    }
}

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        let (status, code) = match &err {
            DownloadError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            DownloadError::NetworkUnreachable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "NETWORK_UNREACHABLE")
            }
            DownloadError::QueueFull => (StatusCode::SERVICE_UNAVAILABLE, "QUEUE_FULL"),
            DownloadError::ExtractionExhausted(_) => (StatusCode::NOT_FOUND, "NO_MEDIA_INFO"),
            DownloadError::ToolNotFound(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ENGINE_MISSING"),
            DownloadError::NetworkTimeout(_)
            | DownloadError::ParseError(_)
            | DownloadError::ExecutionError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "EXTRACTION_FAILED")
            }
        };

        Self {
            status,
            message: err.to_string(),
            code,
        }
    }
}

impl From<HandoffError> for ApiError {
    fn from(err: HandoffError) -> Self {
        let code = match err {
            HandoffError::NotReady => "NOT_READY",
            HandoffError::NotFound => "NOT_FOUND",
        };
        Self {
            status: StatusCode::NOT_FOUND,
            message: err.to_string(),
            code,
        }
    }
}
