//! Testing utilities for users of the errand library.
//!
//! This module provides scripted agents and a harness for exercising the
//! queue, worker and supervisor without a real reasoning agent:
//!
//! - [`StaticAgent`]: always answers with the same response
//! - [`FailingAgent`]: fails N times (or always), then echoes
//! - [`HangingAgent`]: never answers, and records when it is cancelled
//! - [`RecordingAgent`]: records every query and how many ran at once
//! - [`ScriptedAgent`]: per-query behaviour
//! - [`TestHarness`]: an orchestrator with in-memory storage and a running worker

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::core::task::Task;
use crate::core::types::TaskId;
use crate::execution::{Agent, AgentError, ExecutionSupervisor};
use crate::orchestrator::{Orchestrator, OrchestratorError};
use crate::storage::InMemoryStorage;
use crate::worker::{ShutdownMode, WorkerError, WorkerHandle};

/// An agent that always returns the same response.
///
/// ```
/// use errand::testing::StaticAgent;
///
/// let agent = StaticAgent::new("Meeting created");
/// ```
pub struct StaticAgent {
    response: String,
    calls: AtomicU32,
}

impl StaticAgent {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            calls: AtomicU32::new(0),
        }
    }

    /// Number of invocations so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for StaticAgent {
    fn name(&self) -> &str {
        "static"
    }

    async fn invoke(&self, _query: &str) -> Result<String, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// An agent that fails a number of times, then echoes the query.
pub struct FailingAgent {
    /// Protects the failure counter under concurrent invocations.
    state: Mutex<FailingAgentState>,
    error_message: String,
}

struct FailingAgentState {
    failures_remaining: Option<u32>,
    call_count: u32,
}

impl FailingAgent {
    /// Create an agent that always fails with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(FailingAgentState {
                failures_remaining: None,
                call_count: 0,
            }),
            error_message: message.into(),
        }
    }

    /// Create an agent that fails `fail_count` times, then succeeds.
    pub fn times(fail_count: u32, message: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(FailingAgentState {
                failures_remaining: Some(fail_count),
                call_count: 0,
            }),
            error_message: message.into(),
        }
    }

    /// Get the number of times this agent has been called.
    pub async fn call_count(&self) -> u32 {
        self.state.lock().await.call_count
    }
}

#[async_trait]
impl Agent for FailingAgent {
    fn name(&self) -> &str {
        "failing"
    }

    async fn invoke(&self, query: &str) -> Result<String, AgentError> {
        let mut state = self.state.lock().await;
        state.call_count += 1;

        match &mut state.failures_remaining {
            None => Err(AgentError::Failed(self.error_message.clone())),
            Some(remaining) if *remaining == 0 => Ok(query.to_string()),
            Some(remaining) => {
                *remaining -= 1;
                Err(AgentError::Failed(self.error_message.clone()))
            }
        }
    }
}

/// An agent that never answers.
///
/// Cancelling the invocation sets the flag read by [`HangingAgent::was_cancelled`].
pub struct HangingAgent {
    cancelled: Arc<AtomicBool>,
    calls: AtomicU32,
}

struct CancelGuard(Arc<AtomicBool>);

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl HangingAgent {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            calls: AtomicU32::new(0),
        }
    }

    /// Whether an invocation has been dropped.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for HangingAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for HangingAgent {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn invoke(&self, _query: &str) -> Result<String, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _guard = CancelGuard(Arc::clone(&self.cancelled));
        std::future::pending::<()>().await;
        Ok(String::new())
    }
}

/// An agent that records every query it receives.
///
/// Answers with `"done: {query}"` after an optional delay, and tracks the
/// highest number of invocations that were in flight at once.
pub struct RecordingAgent {
    queries: Mutex<Vec<String>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingAgent {
    pub fn new() -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Wait this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queries in the order they were received.
    pub async fn queries(&self) -> Vec<String> {
        self.queries.lock().await.clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for RecordingAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for RecordingAgent {
    fn name(&self) -> &str {
        "recording"
    }

    async fn invoke(&self, query: &str) -> Result<String, AgentError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.queries.lock().await.push(query.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("done: {}", query))
    }
}

/// What a [`ScriptedAgent`] does for one query.
#[derive(Debug, Clone)]
pub enum Script {
    Respond(String),
    Fail(String),
    Hang,
}

/// An agent with per-query behaviour. Unscripted queries are echoed back.
///
/// ```
/// use errand::testing::ScriptedAgent;
///
/// let agent = ScriptedAgent::new()
///     .respond("create a meeting", "Meeting created")
///     .fail("send an email", "smtp unavailable")
///     .hang("search the web");
/// ```
#[derive(Default)]
pub struct ScriptedAgent {
    scripts: HashMap<String, Script>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, query: impl Into<String>, response: impl Into<String>) -> Self {
        self.scripts
            .insert(query.into(), Script::Respond(response.into()));
        self
    }

    pub fn fail(mut self, query: impl Into<String>, message: impl Into<String>) -> Self {
        self.scripts.insert(query.into(), Script::Fail(message.into()));
        self
    }

    pub fn hang(mut self, query: impl Into<String>) -> Self {
        self.scripts.insert(query.into(), Script::Hang);
        self
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, query: &str) -> Result<String, AgentError> {
        match self.scripts.get(query) {
            Some(Script::Respond(response)) => Ok(response.clone()),
            Some(Script::Fail(message)) => Err(AgentError::Failed(message.clone())),
            Some(Script::Hang) => {
                std::future::pending::<()>().await;
                Ok(String::new())
            }
            None => Ok(query.to_string()),
        }
    }
}

/// An orchestrator over in-memory storage with its worker already running.
///
/// # Example
///
/// ```ignore
/// use errand::testing::{StaticAgent, TestHarness};
///
/// let harness = TestHarness::start(StaticAgent::new("done"));
/// let task = harness.submit_and_wait("draft a note").await?;
/// assert_eq!(task.result.as_deref(), Some("done"));
/// ```
pub struct TestHarness {
    orchestrator: Orchestrator<InMemoryStorage>,
    worker: WorkerHandle,
    join: Option<JoinHandle<()>>,
    wait_limit: Duration,
}

impl TestHarness {
    /// Start a harness with the default 30 second timeout.
    pub fn start(agent: impl Agent + 'static) -> Self {
        Self::with_supervisor(ExecutionSupervisor::new(Arc::new(agent)))
    }

    /// Start a harness with a custom invocation timeout.
    pub fn with_timeout(agent: impl Agent + 'static, timeout: Duration) -> Self {
        Self::with_supervisor(ExecutionSupervisor::new(Arc::new(agent)).with_timeout(timeout))
    }

    /// Start a harness around a preconfigured supervisor.
    pub fn with_supervisor(supervisor: ExecutionSupervisor) -> Self {
        let wait_limit = supervisor.timeout() + supervisor.cancel_grace() + Duration::from_secs(5);
        let orchestrator = Orchestrator::new(InMemoryStorage::new());
        let (worker, join) = orchestrator.start(supervisor);
        Self {
            orchestrator,
            worker,
            join: Some(join),
            wait_limit,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator<InMemoryStorage> {
        &self.orchestrator
    }

    pub fn worker(&self) -> &WorkerHandle {
        &self.worker
    }

    /// Submit a task and wait for it to reach a terminal state.
    pub async fn submit_and_wait(&self, description: &str) -> Result<Task, OrchestratorError> {
        let id = self.orchestrator.submit(description).await?;
        self.wait_for_terminal(&id).await
    }

    /// Poll until the task is `Completed` or `Failed`.
    ///
    /// Gives up after the supervisor's timeout plus its grace period plus a
    /// margin, returning the last observed record.
    pub async fn wait_for_terminal(&self, id: &TaskId) -> Result<Task, OrchestratorError> {
        let deadline = tokio::time::Instant::now() + self.wait_limit;
        loop {
            let task = self.orchestrator.get_task(id).await?;
            if task.status.is_terminal() || tokio::time::Instant::now() >= deadline {
                return Ok(task);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Shut the worker down and wait for its loop to exit.
    pub async fn shutdown(mut self, mode: ShutdownMode) -> Result<(), WorkerError> {
        self.worker.shutdown(mode).await?;
        if let Some(join) = self.join.take() {
            join.await
                .map_err(|e| WorkerError::ChannelError(format!("worker task failed: {}", e)))?;
        }
        Ok(())
    }
}
