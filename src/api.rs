// src/api.rs
use shuttle_axum::axum::{extract::State, routing::get, Json, Router};
use tower_http::cors::CorsLayer;

use crate::scheduler::{PipelineStatus, SharedStatus};

#[derive(Clone)]
pub struct AppState {
    pub status: SharedStatus,
}

impl AppState {
    pub fn new(status: SharedStatus) -> Self {
        Self { status }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/stats", get(stats))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn stats(State(state): State<AppState>) -> Json<PipelineStatus> {
    let snapshot = state
        .status
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone();
    Json(snapshot)
}
