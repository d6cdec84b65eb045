//! Complete workflow integration tests.
//!
//! Tests that verify tasks travel from submission through the worker and the
//! supervisor to a terminal state, plus plan graph readiness.

use async_trait::async_trait;
use errand::testing::{
    FailingAgent, HangingAgent, RecordingAgent, ScriptedAgent, StaticAgent, TestHarness,
};
use errand::{
    Dag, Event, EventBus, EventHandler, ExecutionSupervisor, InMemoryStorage, NodeStatus,
    NodeType, Orchestrator, OrchestratorError, ShutdownMode, TaskId, TaskStatus,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::common::wait_for_status;

/// Recording event handler for verifying events.
struct RecordingHandler {
    events: Mutex<Vec<Event>>,
}

impl RecordingHandler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }

    async fn started_order(&self) -> Vec<TaskId> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| matches!(e, Event::TaskStarted { .. }))
            .map(|e| e.task_id())
            .collect()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &Event) {
        self.events.lock().await.push(event.clone());
    }
}

/// Test: A submitted task completes with the agent's response.
#[tokio::test]
async fn test_submit_completes_with_agent_response() {
    let harness = TestHarness::start(StaticAgent::new("done"));

    let task = harness
        .orchestrator()
        .create_task("draft a note")
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Queued);

    let task = harness.wait_for_terminal(&task.id).await.unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.result.as_deref(), Some("done"));
    assert!(task.started_at.is_some());
    assert!(task.completed_at.is_some());
    assert!(task.error.is_none());
    assert!(task.thoughts.len() >= 2);

    let texts: Vec<&str> = task.thoughts.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "Task created and added to queue",
            "Starting task processing",
            "Initializing agent query",
            "Executing agent query with 30-second timeout",
            "Query completed successfully",
        ]
    );
    for (i, thought) in task.thoughts.iter().enumerate() {
        assert_eq!(thought.step as usize, i + 1);
    }

    harness.shutdown(ShutdownMode::Drain).await.unwrap();
}

/// Test: A hanging agent is cancelled and the task fails with a timeout.
#[tokio::test]
async fn test_hanging_agent_times_out() {
    let agent = Arc::new(HangingAgent::new());
    let supervisor = ExecutionSupervisor::new(agent.clone())
        .with_timeout(Duration::from_millis(200))
        .with_cancel_grace(Duration::from_secs(1));
    let harness = TestHarness::with_supervisor(supervisor);

    let task = harness.submit_and_wait("hang forever").await.unwrap();

    assert_eq!(task.status, TaskStatus::Failed);
    let error = task.error.expect("failed task carries an error");
    assert!(error.message.contains("timeout"), "got: {}", error.message);
    assert_eq!(error.message, "Task exceeded 0.2 second timeout limit");
    assert!(task.result.is_none());
    assert!(task.completed_at.is_some());
    assert_eq!(
        task.thoughts.last().map(|t| t.text.as_str()),
        Some("Task exceeded timeout limit")
    );
    assert!(agent.was_cancelled());

    harness.shutdown(ShutdownMode::Drain).await.unwrap();
}

/// Test: An empty description is rejected and nothing is stored.
#[tokio::test]
async fn test_empty_submission_rejected() {
    let harness = TestHarness::start(StaticAgent::new("done"));

    for description in ["", "   "] {
        let result = harness.orchestrator().submit(description).await;
        assert!(matches!(result, Err(OrchestratorError::Validation(_))));
    }

    assert!(harness.orchestrator().list_tasks().await.unwrap().is_empty());
    assert_eq!(harness.orchestrator().queue_depth().await, 0);

    harness.shutdown(ShutdownMode::Drain).await.unwrap();
}

/// Test: Unknown ids are reported as not found.
#[tokio::test]
async fn test_unknown_task_not_found() {
    let harness = TestHarness::start(StaticAgent::new("done"));
    let unknown = TaskId::new();

    assert!(matches!(
        harness.orchestrator().delete_task(&unknown).await,
        Err(OrchestratorError::NotFound(id)) if id == unknown
    ));
    assert!(matches!(
        harness.orchestrator().get_task(&unknown).await,
        Err(OrchestratorError::NotFound(_))
    ));
    assert!(matches!(
        harness.orchestrator().append_thought(&unknown, "note").await,
        Err(OrchestratorError::NotFound(_))
    ));

    harness.shutdown(ShutdownMode::Drain).await.unwrap();
}

/// Test: An agent fault fails only that task; the worker keeps going.
#[tokio::test]
async fn test_fault_is_isolated_to_its_task() {
    let agent = ScriptedAgent::new().fail("book the room", "calendar offline");
    let harness = TestHarness::start(agent);

    let bad = harness.orchestrator().submit("book the room").await.unwrap();
    let good = harness.orchestrator().submit("send the invite").await.unwrap();

    let bad = harness.wait_for_terminal(&bad).await.unwrap();
    let good = harness.wait_for_terminal(&good).await.unwrap();

    assert_eq!(bad.status, TaskStatus::Failed);
    let error = bad.error.unwrap();
    assert_eq!(error.message, "Exception: agent failed: calendar offline");
    assert!(error.trace.is_some_and(|trace| !trace.is_empty()));
    assert_eq!(
        bad.thoughts.last().map(|t| t.text.as_str()),
        Some("Task failed with error: agent failed: calendar offline")
    );

    assert_eq!(good.status, TaskStatus::Completed);
    assert_eq!(good.result.as_deref(), Some("send the invite"));
    assert!(harness.worker().is_running().await);

    harness.shutdown(ShutdownMode::Drain).await.unwrap();
}

/// Test: A flaky agent only affects the calls that fail.
#[tokio::test]
async fn test_failing_agent_then_recovery() {
    let harness = TestHarness::start(FailingAgent::times(1, "transient"));

    let first = harness.submit_and_wait("first").await.unwrap();
    let second = harness.submit_and_wait("second").await.unwrap();

    assert_eq!(first.status, TaskStatus::Failed);
    assert_eq!(second.status, TaskStatus::Completed);
    assert_eq!(second.result.as_deref(), Some("second"));

    harness.shutdown(ShutdownMode::Drain).await.unwrap();
}

/// Test: Tasks run one at a time in submission order.
#[tokio::test]
async fn test_fifo_single_flight() {
    let agent = Arc::new(RecordingAgent::new().with_delay(Duration::from_millis(20)));
    let handler = RecordingHandler::new();
    let bus = Arc::new(EventBus::new());
    bus.register(handler.clone()).await;

    let orchestrator = Orchestrator::new(InMemoryStorage::new()).with_event_bus(bus);
    let (worker, join) = orchestrator.start(ExecutionSupervisor::new(agent.clone()));

    let mut ids = Vec::new();
    let mut queries = Vec::new();
    for i in 0..5 {
        let query = format!("step {}", i);
        ids.push(orchestrator.submit(&query).await.unwrap());
        queries.push(query);
    }

    for id in &ids {
        wait_for_status(
            orchestrator.storage().as_ref(),
            id,
            TaskStatus::Completed,
            Duration::from_secs(5),
        )
        .await;
    }

    assert_eq!(agent.queries().await, queries);
    assert_eq!(agent.max_in_flight(), 1);
    assert_eq!(handler.started_order().await, ids);

    worker.shutdown(ShutdownMode::Drain).await.unwrap();
    join.await.unwrap();
}

/// Test: Lifecycle events arrive in status order and never after a terminal one.
#[tokio::test]
async fn test_status_is_monotonic() {
    let handler = RecordingHandler::new();
    let bus = Arc::new(EventBus::new());
    bus.register(handler.clone()).await;

    let orchestrator = Orchestrator::new(InMemoryStorage::new()).with_event_bus(bus);
    let (worker, join) =
        orchestrator.start(ExecutionSupervisor::new(Arc::new(StaticAgent::new("ok"))));

    let id = orchestrator.submit("one").await.unwrap();
    let done = wait_for_status(
        orchestrator.storage().as_ref(),
        &id,
        TaskStatus::Completed,
        Duration::from_secs(5),
    )
    .await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    let later = orchestrator.get_task(&id).await.unwrap();
    assert_eq!(later.status, TaskStatus::Completed);
    assert_eq!(later.completed_at, done.completed_at);

    let events = handler.events().await;
    assert_eq!(events.len(), 3);
    assert!(matches!(events[0], Event::TaskQueued { .. }));
    assert!(matches!(events[1], Event::TaskStarted { .. }));
    assert!(matches!(events[2], Event::TaskCompleted { .. }));

    worker.shutdown(ShutdownMode::Drain).await.unwrap();
    join.await.unwrap();
}

/// Test: Deleting a task mid-flight drops its late result.
#[tokio::test]
async fn test_delete_while_processing() {
    let agent = RecordingAgent::new().with_delay(Duration::from_millis(200));
    let harness = TestHarness::start(agent);
    let orchestrator = harness.orchestrator();

    let doomed = orchestrator.submit("doomed").await.unwrap();
    wait_for_status(
        orchestrator.storage().as_ref(),
        &doomed,
        TaskStatus::Processing,
        Duration::from_secs(5),
    )
    .await;

    orchestrator.delete_task(&doomed).await.unwrap();

    let next = harness.submit_and_wait("next").await.unwrap();
    assert_eq!(next.status, TaskStatus::Completed);
    assert_eq!(next.result.as_deref(), Some("done: next"));

    assert!(matches!(
        orchestrator.get_task(&doomed).await,
        Err(OrchestratorError::NotFound(_))
    ));
    assert_eq!(orchestrator.list_tasks().await.unwrap().len(), 1);

    harness.shutdown(ShutdownMode::Drain).await.unwrap();
}

/// Test: A task deleted while still queued is skipped by the worker.
#[tokio::test]
async fn test_delete_while_queued() {
    let agent = Arc::new(RecordingAgent::new().with_delay(Duration::from_millis(100)));
    let harness = TestHarness::with_supervisor(ExecutionSupervisor::new(agent.clone()));
    let orchestrator = harness.orchestrator();

    let first = orchestrator.submit("first").await.unwrap();
    let skipped = orchestrator.submit("skipped").await.unwrap();
    orchestrator.delete_task(&skipped).await.unwrap();
    let last = orchestrator.submit("last").await.unwrap();

    harness.wait_for_terminal(&first).await.unwrap();
    harness.wait_for_terminal(&last).await.unwrap();

    assert_eq!(agent.queries().await, vec!["first", "last"]);

    harness.shutdown(ShutdownMode::Drain).await.unwrap();
}

/// Test: Root nodes are ready first, then targets once their source completes.
#[test]
fn test_dag_linear_readiness() {
    let mut dag = Dag::new();
    let a = dag.add_node(NodeType::ToolCall, json!({"tool": "calendar"}));
    let b = dag.add_node(NodeType::Llm, json!({"prompt": "summarize"}));
    dag.add_edge(a, b).unwrap();

    assert_eq!(dag.get_next_nodes(), vec![a]);

    dag.complete_node(a, json!("ok")).unwrap();
    dag.set_current(a).unwrap();

    assert_eq!(dag.get_next_nodes(), vec![b]);
}

/// Test: Fan-out makes every target ready; fan-in waits for every source.
#[test]
fn test_dag_fan_out_and_fan_in() {
    let mut dag = Dag::new();
    let plan = dag.add_node(NodeType::Llm, json!({}));
    let left = dag.add_node(NodeType::ToolCall, json!({"tool": "mail"}));
    let right = dag.add_node(NodeType::ToolCall, json!({"tool": "notes"}));
    let join = dag.add_node(NodeType::Condition, json!({"if": "both"}));
    dag.add_edge(plan, left).unwrap();
    dag.add_edge(plan, right).unwrap();
    dag.add_edge(left, join).unwrap();
    dag.add_edge(right, join).unwrap();

    dag.complete_node(plan, json!(null)).unwrap();
    dag.set_current(plan).unwrap();
    assert_eq!(dag.get_next_nodes(), vec![left, right]);

    dag.complete_node(left, json!(null)).unwrap();
    dag.set_current(left).unwrap();
    assert!(dag.get_next_nodes().is_empty());

    dag.complete_node(right, json!(null)).unwrap();
    dag.set_current(right).unwrap();
    assert_eq!(dag.get_next_nodes(), vec![join]);

    assert_eq!(dag.node(join).map(|n| n.status), Some(NodeStatus::Pending));
    let order = dag.topological_order().unwrap();
    assert_eq!(order.first(), Some(&plan));
    assert_eq!(order.last(), Some(&join));
}
