use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use fleetforge_core::{CellCapacity, CellConfig, CellManager, InMemoryCheckpointSink, ManagerConfig};
use fleetforge_gateway::{build_router, GatewayConfig, GatewayState};
use fleetforge_router::{CellInfo, Router};
use serde_json::Value;
use tower::ServiceExt;

async fn test_state(rate: f64, burst: f64) -> GatewayState {
    let manager = CellManager::new(CellConfig::default(), ManagerConfig::default(), Arc::new(InMemoryCheckpointSink::default()));
    let router = Arc::new(Router::new());

    let cell_id = fleetforge_core::CellId::new("cell-a").unwrap();
    let spec = fleetforge_core::CellSpec {
        id: cell_id.clone(),
        boundaries: fleetforge_geometry::WorldBounds::new_2d(
            fleetforge_geometry::AxisBounds::new(0.0, 100.0).unwrap(),
            fleetforge_geometry::AxisBounds::new(0.0, 100.0).unwrap(),
        ),
        capacity: CellCapacity::new(10),
    };
    manager.create_cell(spec).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    router.register_cell(CellInfo::new(cell_id, "cell-a.local:9000", 10));

    let config = GatewayConfig {
        rate,
        burst,
        ..GatewayConfig::default()
    };
    GatewayState::new(manager, router, config).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn connect_assigns_the_registered_cell() {
    let state = test_state(100.0, 20.0).await;
    let app = build_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/connect")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&serde_json::json!({ "playerId": "p1" })).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["assignedCell"], "cell-a");
}

#[tokio::test]
async fn connect_rejects_empty_player_id() {
    let state = test_state(100.0, 20.0).await;
    let app = build_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/connect")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&serde_json::json!({ "playerId": "" })).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn connect_is_rate_limited_past_burst() {
    let state = test_state(0.0, 1.0).await;
    let app = build_router(state);

    let make_request = |player_id: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/v1/connect")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&serde_json::json!({ "playerId": player_id })).unwrap()))
            .unwrap()
    };

    let first = app.clone().oneshot(make_request("p1")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.clone().oneshot(make_request("p2")).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn list_cells_reports_the_admin_registry() {
    let state = test_state(100.0, 20.0).await;
    let app = build_router(state);

    let request = Request::builder().uri("/api/v1/cells").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let cells = body.as_array().unwrap();
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0]["id"], "cell-a");
}

#[tokio::test]
async fn ready_reports_unavailable_with_no_healthy_cells() {
    let manager = CellManager::new(CellConfig::default(), ManagerConfig::default(), Arc::new(InMemoryCheckpointSink::default()));
    let router = Arc::new(Router::new());
    let state = GatewayState::new(manager, router, GatewayConfig::default()).unwrap();
    let app = build_router(state);

    let request = Request::builder().uri("/ready").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
