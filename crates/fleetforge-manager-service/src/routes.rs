use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router as AxumRouter,
};
use fleetforge_core::{CellError, CellId, CellState};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tower_http::trace::TraceLayer;

use crate::state::ManagerState;

pub fn build_router(state: ManagerState) -> AxumRouter {
    AxumRouter::new()
        .route("/cells", get(list_cells))
        .route("/events", get(list_events))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/admin/cells/:id/force-split", post(force_split))
        .route("/admin/merge", post(force_merge))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

struct ApiError(StatusCode, String);

impl From<CellError> for ApiError {
    fn from(err: CellError) -> Self {
        let status = match &err {
            CellError::InvalidInput(_) | CellError::CapacityExceeded { .. } => StatusCode::BAD_REQUEST,
            CellError::CellNotFound(_) | CellError::PlayerNotFound(_) => StatusCode::NOT_FOUND,
            CellError::AlreadyExists(_) => StatusCode::CONFLICT,
            CellError::Timeout { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CellError::Conflict(_) | CellError::NotReady { .. } | CellError::ThresholdNotMet(_) | CellError::Transient(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        Self(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

async fn list_cells(State(state): State<ManagerState>) -> Json<Vec<CellState>> {
    Json(state.manager.list_cells().iter().map(fleetforge_core::Cell::get_state).collect())
}

#[derive(Deserialize)]
struct EventsQuery {
    since: Option<String>,
}

async fn list_events(State(state): State<ManagerState>, Query(query): Query<EventsQuery>) -> Result<impl IntoResponse, ApiError> {
    let events = match query.since {
        Some(raw) => {
            let since = OffsetDateTime::parse(&raw, &time::format_description::well_known::Rfc3339)
                .map_err(|e| CellError::InvalidInput(e.to_string()))?;
            state.manager.get_events_since(since)
        }
        None => state.manager.get_events(),
    };
    Ok(Json(events))
}

async fn metrics(State(state): State<ManagerState>) -> Response {
    match crate::metrics::render(&state.manager) {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn ready(State(state): State<ManagerState>) -> StatusCode {
    if state.manager.list_cells().is_empty() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForceSplitRequest {
    requested_by: String,
}

/// Implements the `fleetforge.io/force-split=<cellId>` annotation contract:
/// a manual split, bypassing cooldown and threshold, with caller identity
/// stamped into the resulting event's metadata.
async fn force_split(
    State(state): State<ManagerState>,
    Path(id): Path<String>,
    Json(req): Json<ForceSplitRequest>,
) -> Result<StatusCode, ApiError> {
    let id = CellId::new(id)?;
    let user_info = serde_json::json!({ "requestedBy": req.requested_by });
    state.manager.manual_split_cell(&id, user_info).await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForceMergeRequest {
    source_cell_id: String,
    target_cell_id: String,
    requested_by: String,
    reason: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ForceMergeResponse {
    merged_cell_id: String,
}

/// Implements the annotation-carried `{sourceCellId, targetCellId,
/// requestedBy, reason, forceUnsafe}` merge payload. `forceUnsafe` is
/// accepted but unused: every `ManualMergeCells` call already bypasses the
/// threshold check, so there is no unsafe path to separately force.
async fn force_merge(State(state): State<ManagerState>, Json(req): Json<ForceMergeRequest>) -> Result<Json<ForceMergeResponse>, ApiError> {
    let source = CellId::new(req.source_cell_id)?;
    let target = CellId::new(req.target_cell_id)?;
    let user_info = serde_json::json!({ "requestedBy": req.requested_by, "reason": req.reason });
    let merged = state.manager.manual_merge_cells(&source, &target, user_info).await?;
    Ok(Json(ForceMergeResponse { merged_cell_id: merged.id().to_string() }))
}
