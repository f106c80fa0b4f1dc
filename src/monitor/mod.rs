use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::cache::{CacheStore, LastWarmReport, MetricsSink, StoreHealth};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CacheStore>,
    pub metrics: Arc<dyn MetricsSink>,
    pub last_warm: LastWarmReport,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    store: StoreHealth,
}

/// Build the Axum router for the operational monitor.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/cache/metrics", get(metrics_handler))
        .route("/api/warming/last", get(last_warming_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// GET /api/health
async fn health_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .store
        .health()
        .await
        .map(|store| Json(HealthResponse { status: "ok", store }))
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}

/// GET /api/cache/metrics
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// GET /api/warming/last
async fn last_warming_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .last_warm
        .read()
        .await
        .clone()
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "no warming run yet".to_string()))
}
