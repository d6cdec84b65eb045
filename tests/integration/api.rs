//! API integration tests.
//!
//! These tests drive the HTTP router directly and verify status codes and
//! response bodies.

use errand::api::{ApiState, build_router, create_api_state};
use errand::storage::InMemoryStorage;
use errand::testing::StaticAgent;
use errand::{ExecutionSupervisor, Orchestrator, TaskStatus};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use crate::common::wait_for_status;

/// Create a test API state with a running worker and a static agent.
fn create_test_state() -> ApiState<InMemoryStorage> {
    let orchestrator = Orchestrator::new(InMemoryStorage::new());
    let supervisor = ExecutionSupervisor::new(Arc::new(StaticAgent::new("Meeting created")));
    let (worker, _task) = orchestrator.start(supervisor);

    create_api_state(orchestrator, worker)
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn submit_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/tasks/submit")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test: Health endpoint responds with status ok.
#[tokio::test]
async fn test_health_endpoint() {
    let router = build_router(create_test_state());

    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

/// Test: Worker state endpoint reports an idle, accepting worker.
#[tokio::test]
async fn test_worker_state_endpoint() {
    let router = build_router(create_test_state());

    let request = Request::builder()
        .uri("/api/worker/state")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["state"], "idle");
    assert_eq!(json["queue_depth"], 0);
    assert_eq!(json["accepting"], true);
    assert!(json["current_task"].is_null());
}

/// Test: Submitting a query returns its id, then the task completes.
#[tokio::test]
async fn test_submit_then_get_task() {
    let state = create_test_state();
    let storage = Arc::clone(state.orchestrator.storage());
    let router = build_router(state);

    let response = router
        .clone()
        .oneshot(submit_request(json!({"query": "Create a meeting tomorrow at 3pm"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "queued");
    let task_id = json["task_id"].as_str().unwrap().to_string();

    wait_for_status(
        storage.as_ref(),
        &task_id.parse().unwrap(),
        TaskStatus::Completed,
        Duration::from_secs(5),
    )
    .await;

    let request = Request::builder()
        .uri(format!("/api/tasks/{}", task_id))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["task_id"], task_id.as_str());
    assert_eq!(json["task_description"], "Create a meeting tomorrow at 3pm");
    assert_eq!(json["status"], "completed");
    assert_eq!(json["result"], "Meeting created");
    assert!(json["completed_at"].is_string());
    assert!(json["error_message"].is_null());
    assert!(json["thoughts"].as_array().unwrap().len() >= 2);
    assert_eq!(json["thoughts"][0]["step"], 1);
    assert_eq!(json["metadata"]["priority"], "normal");
}

/// Test: An empty query is rejected with 400.
#[tokio::test]
async fn test_submit_empty_query_rejected() {
    let state = create_test_state();
    let orchestrator = state.orchestrator.clone();
    let router = build_router(state);

    for body in [json!({"query": ""}), json!({})] {
        let response = router.clone().oneshot(submit_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert!(json["error"].is_string());
    }

    assert!(orchestrator.list_tasks().await.unwrap().is_empty());
}

/// Test: List endpoint returns tasks keyed by id.
#[tokio::test]
async fn test_list_tasks_endpoint() {
    let state = create_test_state();
    let orchestrator = state.orchestrator.clone();
    let router = build_router(state);

    let first = orchestrator.submit("first").await.unwrap();
    let second = orchestrator.submit("second").await.unwrap();

    let request = Request::builder()
        .uri("/api/tasks")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["count"], 2);
    let tasks = json["tasks"].as_object().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[&first.to_string()]["task_description"], "first");
    assert_eq!(tasks[&second.to_string()]["task_description"], "second");
}

/// Test: Deleting a task removes it, and a second delete is 404.
#[tokio::test]
async fn test_delete_task_endpoint() {
    let state = create_test_state();
    let orchestrator = state.orchestrator.clone();
    let router = build_router(state);

    let id = orchestrator.submit("throwaway").await.unwrap();
    let uri = format!("/api/tasks/{}", id);

    let request = Request::builder()
        .method("DELETE")
        .uri(&uri)
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Task deleted successfully");

    let request = Request::builder()
        .method("DELETE")
        .uri(&uri)
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let request = Request::builder().uri(&uri).body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Test: Unknown and malformed ids are both 404.
#[tokio::test]
async fn test_get_unknown_task_not_found() {
    let router = build_router(create_test_state());

    for uri in [
        "/api/tasks/00000000-0000-0000-0000-000000000000",
        "/api/tasks/not-a-task-id",
    ] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = router.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["code"], "NOT_FOUND");
    }
}

/// Test: Submitting after the worker shut down is 503.
#[tokio::test]
async fn test_submit_after_shutdown_unavailable() {
    let state = create_test_state();
    state
        .worker
        .shutdown(errand::ShutdownMode::Drain)
        .await
        .unwrap();
    let router = build_router(state);

    let response = router
        .oneshot(submit_request(json!({"query": "too late"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
