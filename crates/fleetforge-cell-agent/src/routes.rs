use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router as AxumRouter};
use fleetforge_core::Cell;
use serde::Serialize;

use crate::metrics::CellAgentMetrics;

#[derive(Clone)]
pub struct HealthState {
    pub cell: Cell,
}

#[derive(Clone)]
pub struct MetricsState {
    pub cell: Cell,
    pub metrics: Arc<CellAgentMetrics>,
}

pub fn build_health_router(state: HealthState) -> AxumRouter {
    AxumRouter::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/status", get(status))
        .with_state(state)
}

pub fn build_metrics_router(state: MetricsState) -> AxumRouter {
    AxumRouter::new().route("/metrics", get(metrics)).with_state(state)
}

async fn health(State(state): State<HealthState>) -> StatusCode {
    if state.cell.get_health().healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Ready iff healthy and load is below the point a router would start
/// steering new players elsewhere.
async fn ready(State(state): State<HealthState>) -> StatusCode {
    let healthy = state.cell.get_health().healthy;
    let load = state.cell.get_density_ratio();
    if healthy && load < 0.9 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    id: String,
    healthy: bool,
    current_players: u32,
    max_players: u32,
    boundaries: fleetforge_geometry::WorldBounds,
    uptime_secs: f64,
}

async fn status(State(state): State<HealthState>) -> Json<StatusResponse> {
    let health = state.cell.get_health();
    Json(StatusResponse {
        id: state.cell.id().to_string(),
        healthy: health.healthy,
        current_players: health.player_count,
        max_players: state.cell.capacity().max_players,
        boundaries: state.cell.boundaries(),
        uptime_secs: health.uptime.as_secs_f64(),
    })
}

async fn metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    match state.metrics.render(&state.cell) {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
