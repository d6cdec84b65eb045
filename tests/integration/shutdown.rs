//! Worker shutdown integration tests.
//!
//! Tests that verify the worker stops accepting work on shutdown, then
//! either drains or abandons whatever is still queued.

use errand::testing::{RecordingAgent, StaticAgent, TestHarness};
use errand::{
    ExecutionSupervisor, InMemoryStorage, Orchestrator, OrchestratorError, ShutdownMode,
    TaskStatus, WorkerState,
};
use std::sync::Arc;
use std::time::Duration;

use crate::common::wait_for_status;

/// Test: Drain finishes the in-flight task and everything queued behind it.
#[tokio::test]
async fn test_drain_processes_remaining_tasks() {
    let agent = Arc::new(RecordingAgent::new().with_delay(Duration::from_millis(50)));
    let orchestrator = Orchestrator::new(InMemoryStorage::new());
    let (worker, join) = orchestrator.start(ExecutionSupervisor::new(agent.clone()));

    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(orchestrator.submit(&format!("task {}", i)).await.unwrap());
    }
    wait_for_status(
        orchestrator.storage().as_ref(),
        &ids[0],
        TaskStatus::Processing,
        Duration::from_secs(5),
    )
    .await;

    worker.shutdown(ShutdownMode::Drain).await.unwrap();
    join.await.unwrap();

    for id in &ids {
        let task = orchestrator.get_task(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }
    assert_eq!(agent.queries().await.len(), 3);
    assert_eq!(worker.state().await, WorkerState::Stopped);
}

/// Test: Abandon finishes the in-flight task and leaves the rest queued.
#[tokio::test]
async fn test_abandon_leaves_queued_tasks() {
    let agent = Arc::new(RecordingAgent::new().with_delay(Duration::from_millis(100)));
    let orchestrator = Orchestrator::new(InMemoryStorage::new());
    let (worker, join) = orchestrator.start(ExecutionSupervisor::new(agent.clone()));

    let first = orchestrator.submit("in flight").await.unwrap();
    let second = orchestrator.submit("left behind").await.unwrap();
    let third = orchestrator.submit("also left behind").await.unwrap();
    wait_for_status(
        orchestrator.storage().as_ref(),
        &first,
        TaskStatus::Processing,
        Duration::from_secs(5),
    )
    .await;

    worker.shutdown(ShutdownMode::Abandon).await.unwrap();
    join.await.unwrap();

    assert_eq!(
        orchestrator.get_task(&first).await.unwrap().status,
        TaskStatus::Completed
    );
    for id in [second, third] {
        assert_eq!(
            orchestrator.get_task(&id).await.unwrap().status,
            TaskStatus::Queued
        );
    }
    assert_eq!(agent.queries().await, vec!["in flight"]);
    assert_eq!(orchestrator.queue_depth().await, 0);
}

/// Test: Submissions are rejected once shutdown has begun.
#[tokio::test]
async fn test_submit_after_shutdown_rejected() {
    let harness = TestHarness::start(StaticAgent::new("ok"));
    let orchestrator = harness.orchestrator().clone();

    assert!(orchestrator.is_accepting().await);
    harness.shutdown(ShutdownMode::Drain).await.unwrap();

    assert!(!orchestrator.is_accepting().await);
    let result = orchestrator.submit("too late").await;
    assert!(matches!(result, Err(OrchestratorError::ShuttingDown)));
    assert!(orchestrator.list_tasks().await.unwrap().is_empty());
}

/// Test: Shutting down an idle worker stops it promptly.
#[tokio::test]
async fn test_shutdown_idle_worker() {
    let orchestrator = Orchestrator::new(InMemoryStorage::new());
    let (worker, join) =
        orchestrator.start(ExecutionSupervisor::new(Arc::new(StaticAgent::new("ok"))));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(worker.state().await, WorkerState::Idle);
    assert!(worker.is_running().await);

    tokio::time::timeout(Duration::from_secs(2), async {
        worker.shutdown(ShutdownMode::Drain).await.unwrap();
        join.await.unwrap();
    })
    .await
    .expect("idle worker should stop quickly");

    assert_eq!(worker.state().await, WorkerState::Stopped);
    assert!(!worker.is_running().await);
    assert!(worker.current_task().await.is_none());
}
