use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use fleetforge_core::{CellCapacity, CellConfig, CellId, CellManager, CellSpec, InMemoryCheckpointSink, ManagerConfig};
use fleetforge_geometry::{AxisBounds, WorldBounds};
use fleetforge_manager_service::{build_router, ManagerState};
use serde_json::Value;
use tower::ServiceExt;

async fn two_sibling_cells() -> (CellManager, CellId, CellId) {
    let manager = CellManager::new(CellConfig::default(), ManagerConfig::default(), Arc::new(InMemoryCheckpointSink::default()));
    let world = CellId::new("world").unwrap();
    manager
        .create_cell(CellSpec {
            id: world.clone(),
            boundaries: WorldBounds::new_2d(AxisBounds::new(0.0, 100.0).unwrap(), AxisBounds::new(0.0, 100.0).unwrap()),
            capacity: CellCapacity::new(20),
        })
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;

    let children = manager.manual_split_cell(&world, Value::Null).await.unwrap();
    (manager, children[0].id().clone(), children[1].id().clone())
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn list_cells_reports_every_registered_cell() {
    let (manager, child_a, _child_b) = two_sibling_cells().await;
    let app = build_router(ManagerState { manager });

    let request = Request::builder().uri("/cells").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let cells = body.as_array().unwrap();
    assert_eq!(cells.len(), 2);
    assert!(cells.iter().any(|c| c["id"] == child_a.to_string()));
}

#[tokio::test]
async fn events_include_the_split_that_produced_the_siblings() {
    let (manager, _child_a, _child_b) = two_sibling_cells().await;
    let app = build_router(ManagerState { manager });

    let request = Request::builder().uri("/events").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let events = body.as_array().unwrap();
    assert!(events.iter().any(|e| e["type"] == "CellSplit"));
}

#[tokio::test]
async fn force_split_accepts_a_valid_cell() {
    let manager = CellManager::new(CellConfig::default(), ManagerConfig::default(), Arc::new(InMemoryCheckpointSink::default()));
    let world = CellId::new("world").unwrap();
    manager
        .create_cell(CellSpec {
            id: world.clone(),
            boundaries: WorldBounds::new_2d(AxisBounds::new(0.0, 100.0).unwrap(), AxisBounds::new(0.0, 100.0).unwrap()),
            capacity: CellCapacity::new(20),
        })
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    let app = build_router(ManagerState { manager });

    let request = Request::builder()
        .method("POST")
        .uri(format!("/admin/cells/{world}/force-split"))
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&serde_json::json!({ "requestedBy": "operator" })).unwrap()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn force_split_404s_for_an_unknown_cell() {
    let manager = CellManager::new(CellConfig::default(), ManagerConfig::default(), Arc::new(InMemoryCheckpointSink::default()));
    let app = build_router(ManagerState { manager });

    let request = Request::builder()
        .method("POST")
        .uri("/admin/cells/does-not-exist/force-split")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&serde_json::json!({ "requestedBy": "operator" })).unwrap()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn force_merge_combines_two_siblings() {
    let (manager, child_a, child_b) = two_sibling_cells().await;
    let app = build_router(ManagerState { manager });

    let request = Request::builder()
        .method("POST")
        .uri("/admin/merge")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_vec(&serde_json::json!({
                "sourceCellId": child_a.to_string(),
                "targetCellId": child_b.to_string(),
                "requestedBy": "operator",
                "reason": "low load",
            }))
            .unwrap(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["mergedCellId"].as_str().unwrap().contains("merged"));
}

#[tokio::test]
async fn ready_is_ok_once_cells_exist() {
    let (manager, _a, _b) = two_sibling_cells().await;
    let app = build_router(ManagerState { manager });

    let request = Request::builder().uri("/ready").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
