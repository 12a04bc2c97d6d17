//! System endpoints: health check and realtime hub statistics.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::ws::HubStats;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    storage: &'static str,
}

/// `GET /health`: service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, storage back end and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            storage: state.item_service.store().backend(),
        }),
    )
}

/// `GET /realtime/stats`: stock update hub counters.
#[utoipa::path(
    get,
    path = "/realtime/stats",
    tag = "System",
    summary = "Realtime hub statistics",
    description = "Connected subscriber count plus publish and delivery drop counters.",
    responses(
        (status = 200, description = "Hub counters", body = HubStats),
    )
)]
pub async fn realtime_stats_handler(State(state): State<AppState>) -> Json<HubStats> {
    Json(state.hub.stats())
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/realtime/stats", get(realtime_stats_handler))
}
