use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router as AxumRouter,
};
use fleetforge_core::{Cell, CellError, PlayerId, PlayerState};
use fleetforge_geometry::Position;
use fleetforge_router::CellInfo;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tower_http::trace::TraceLayer;

use crate::{
    connections::ConnectionKind,
    error::ApiError,
    state::GatewayState,
};

pub fn build_router(state: GatewayState) -> AxumRouter {
    AxumRouter::new()
        .route("/api/v1/connect", post(connect).get(get_affinity))
        .route("/api/v1/sessions", get(list_sessions))
        .route("/api/v1/cells", get(list_cells))
        .route("/admin/cells", post(register_cell))
        .route("/admin/cells/:id", axum::routing::delete(unregister_cell))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    player_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    assigned_cell: String,
    connection_id: String,
    #[serde(with = "time::serde::rfc3339")]
    assigned_at: OffsetDateTime,
}

fn client_identity(addr: &SocketAddr) -> String {
    addr.ip().to_string()
}

/// A point guaranteed inside `cell`'s own boundaries, used to seed a newly
/// connected player until the game server reports a real position.
fn spawn_position(cell: &Cell) -> Position {
    let bounds = cell.boundaries();
    Position::new(bounds.x.mid(), bounds.y.map(|y| y.mid()).unwrap_or(0.0))
}

async fn connect(
    State(state): State<GatewayState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<ConnectResponse>, ApiError> {
    if !state.rate_limiter.try_admit(&client_identity(&addr)) {
        state.metrics.rate_limited_total.inc();
        return Err(ApiError::rate_limited());
    }

    let player_id = PlayerId::new(req.player_id).map_err(ApiError::from)?;
    let connection_id = state.connections.admit(ConnectionKind::Http, addr.to_string());

    let affinity = state
        .sessions
        .create_session(player_id.clone(), connection_id.clone())
        .map_err(|e| ApiError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;

    let cell = state
        .manager
        .get_cell(&affinity.cell_id)
        .ok_or_else(|| CellError::CellNotFound(affinity.cell_id.clone()))?;
    let player = PlayerState::new(player_id.clone(), spawn_position(&cell));
    if let Err(err) = state.manager.add_player(&affinity.cell_id, player.clone()) {
        // A concurrent split may have just retired the cell this session was
        // pointed at; retry once with a freshly resolved cell rather than
        // failing the whole connect.
        if matches!(err, CellError::CellNotFound(_)) {
            state.sessions.destroy_session(&player_id);
            let retried = state
                .sessions
                .create_session(player_id.clone(), connection_id.clone())
                .map_err(|e| ApiError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
            let retried_cell = state
                .manager
                .get_cell(&retried.cell_id)
                .ok_or_else(|| CellError::CellNotFound(retried.cell_id.clone()))?;
            let player = PlayerState::new(player_id.clone(), spawn_position(&retried_cell));
            state.manager.add_player(&retried.cell_id, player)?;
            state.connections.touch(&connection_id, Some(player_id), Some(retried.cell_id.clone()));
            state.metrics.connects_total.inc();
            return Ok(Json(ConnectResponse {
                assigned_cell: retried.cell_id.to_string(),
                connection_id,
                assigned_at: retried.assigned_at,
            }));
        }
        return Err(err.into());
    }

    state.connections.touch(&connection_id, Some(player_id), Some(affinity.cell_id.clone()));
    state.metrics.connects_total.inc();
    Ok(Json(ConnectResponse {
        assigned_cell: affinity.cell_id.to_string(),
        connection_id,
        assigned_at: affinity.assigned_at,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffinityQuery {
    player_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffinityResponse {
    cell_id: String,
    connection_id: String,
    #[serde(with = "time::serde::rfc3339")]
    assigned_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    last_activity: OffsetDateTime,
}

async fn get_affinity(
    State(state): State<GatewayState>,
    Query(query): Query<AffinityQuery>,
) -> Result<Json<AffinityResponse>, ApiError> {
    let player_id = PlayerId::new(query.player_id).map_err(ApiError::from)?;
    let affinity = state
        .sessions
        .get_affinity(&player_id)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "no active session for this player"))?;
    Ok(Json(AffinityResponse {
        cell_id: affinity.cell_id.to_string(),
        connection_id: affinity.connection_id,
        assigned_at: affinity.assigned_at,
        last_activity: affinity.last_activity,
    }))
}

async fn list_sessions(State(state): State<GatewayState>) -> Json<Vec<AffinityResponse>> {
    let sessions = state
        .sessions
        .all_sessions()
        .into_iter()
        .map(|s| AffinityResponse {
            cell_id: s.cell_id.to_string(),
            connection_id: s.connection_id,
            assigned_at: s.assigned_at,
            last_activity: s.last_activity,
        })
        .collect();
    Json(sessions)
}

async fn list_cells(State(state): State<GatewayState>) -> Json<Vec<CellInfo>> {
    Json(state.router.all_cells())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCellRequest {
    id: String,
    address: String,
    capacity: u32,
}

async fn register_cell(
    State(state): State<GatewayState>,
    Json(req): Json<RegisterCellRequest>,
) -> Result<StatusCode, ApiError> {
    let id = fleetforge_core::CellId::new(req.id).map_err(ApiError::from)?;
    state.router.register_cell(CellInfo::new(id, req.address, req.capacity));
    Ok(StatusCode::CREATED)
}

async fn unregister_cell(State(state): State<GatewayState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let id = fleetforge_core::CellId::new(id).map_err(ApiError::from)?;
    state.router.unregister_cell(&id);
    Ok(StatusCode::NO_CONTENT)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn ready(State(state): State<GatewayState>) -> StatusCode {
    if state.router.healthy_cells().is_empty() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

async fn metrics(State(state): State<GatewayState>) -> Response {
    state.metrics.active_connections.set(state.connections.count() as i64);
    state.metrics.active_sessions.set(state.sessions.session_count() as i64);
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
