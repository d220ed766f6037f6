// HTTP surface - axum router over the shared application state

mod error;
mod routes;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use error::ApiError;
pub use routes::content_disposition;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/analyze", get(routes::analyze))
        .route("/download-selected", get(routes::download_selected))
        .route("/progress/:file_id", get(routes::progress))
        .route("/get-file/:file_id", get(routes::get_file))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
