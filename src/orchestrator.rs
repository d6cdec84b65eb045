//! Caller-facing entry point for submitting and inspecting tasks.
//!
//! An `Orchestrator` owns the storage and the queue. Cloning it is cheap and
//! every clone shares the same state, so it can be handed to HTTP handlers,
//! CLI commands and tests alike.
//!
//! ```ignore
//! use std::sync::Arc;
//! use errand::{CommandAgent, ExecutionSupervisor, InMemoryStorage, Orchestrator, ShutdownMode};
//!
//! let orchestrator = Orchestrator::new(InMemoryStorage::new());
//! let agent = CommandAgent::builder("python").args(["-m", "agent"]).build();
//! let (worker, join) = orchestrator.start(ExecutionSupervisor::new(Arc::new(agent)));
//!
//! let id = orchestrator.submit("Create a meeting with Sid tomorrow at 3pm").await?;
//! let task = orchestrator.get_task(&id).await?;
//!
//! worker.shutdown(ShutdownMode::Drain).await?;
//! join.await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::core::task::{Task, Thought};
use crate::core::types::TaskId;
use crate::events::{Event, EventBus};
use crate::execution::ExecutionSupervisor;
use crate::queue::{QueueError, TaskQueue};
use crate::storage::{Storage, StorageError};
use crate::worker::{Worker, WorkerHandle};

const THOUGHT_CREATED: &str = "Task created and added to queue";

/// Errors returned to callers of the orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The submission was rejected before it was queued.
    #[error("validation error: {0}")]
    Validation(String),

    /// No task with this id.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Submissions are closed because the worker is shutting down.
    #[error("orchestrator is shutting down")]
    ShuttingDown,

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl OrchestratorError {
    fn from_storage(id: &TaskId, err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => OrchestratorError::NotFound(*id),
            other => OrchestratorError::Storage(other),
        }
    }
}

impl From<QueueError> for OrchestratorError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Closed => OrchestratorError::ShuttingDown,
        }
    }
}

/// Shared context for task submission and lookup.
pub struct Orchestrator<S: Storage> {
    storage: Arc<S>,
    queue: Arc<TaskQueue>,
    event_bus: Arc<EventBus>,
}

impl<S: Storage> Clone for Orchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            queue: Arc::clone(&self.queue),
            event_bus: Arc::clone(&self.event_bus),
        }
    }
}

impl<S: Storage + 'static> Orchestrator<S> {
    /// Create an orchestrator with the given storage.
    pub fn new(storage: S) -> Self {
        Self::with_storage(Arc::new(storage))
    }

    /// Create an orchestrator with shared storage.
    pub fn with_storage(storage: Arc<S>) -> Self {
        Self {
            storage,
            queue: Arc::new(TaskQueue::new()),
            event_bus: Arc::new(EventBus::new()),
        }
    }

    /// Set the event bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Start the background worker.
    ///
    /// Call once. The worker consumes this orchestrator's queue until it is
    /// shut down through the returned handle.
    pub fn start(&self, supervisor: ExecutionSupervisor) -> (WorkerHandle, JoinHandle<()>) {
        Worker::new(Arc::clone(&self.storage), Arc::clone(&self.queue), supervisor)
            .with_event_bus(Arc::clone(&self.event_bus))
            .start()
    }

    /// Create a queued task and hand it to the worker.
    ///
    /// Returns as soon as the task is recorded and queued; execution happens
    /// in the background.
    pub async fn create_task(&self, description: &str) -> Result<Task, OrchestratorError> {
        if description.trim().is_empty() {
            return Err(OrchestratorError::Validation(
                "task description must not be empty".to_string(),
            ));
        }
        if self.queue.is_closed().await {
            return Err(OrchestratorError::ShuttingDown);
        }

        let mut task = Task::new(description);
        task.add_thought(THOUGHT_CREATED);
        let id = task.id;

        self.storage
            .save_task(task.clone())
            .await
            .map_err(OrchestratorError::Storage)?;

        if let Err(e) = self.queue.push(id).await {
            // Lost a race with shutdown; the record must not linger as Queued.
            if let Err(rollback) = self.storage.delete_task(&id).await {
                tracing::warn!(task_id = %id, error = %rollback, "Failed to roll back rejected task");
            }
            return Err(e.into());
        }

        tracing::debug!(task_id = %id, "Task queued");
        self.event_bus.emit(Event::task_queued(id)).await;
        Ok(task)
    }

    /// Submit a description and return the new task's id.
    pub async fn submit(&self, description: &str) -> Result<TaskId, OrchestratorError> {
        self.create_task(description).await.map(|task| task.id)
    }

    /// Get a task by id.
    pub async fn get_task(&self, id: &TaskId) -> Result<Task, OrchestratorError> {
        self.storage
            .get_task(id)
            .await
            .map_err(|e| OrchestratorError::from_storage(id, e))
    }

    /// Snapshot of every task.
    pub async fn list_tasks(&self) -> Result<HashMap<TaskId, Task>, OrchestratorError> {
        self.storage
            .list_tasks()
            .await
            .map_err(OrchestratorError::Storage)
    }

    /// Remove a task's record.
    ///
    /// A task already being processed keeps running; its outcome is discarded.
    pub async fn delete_task(&self, id: &TaskId) -> Result<(), OrchestratorError> {
        self.storage
            .delete_task(id)
            .await
            .map_err(|e| OrchestratorError::from_storage(id, e))
    }

    /// Append a thought to a task's trail.
    pub async fn append_thought(
        &self,
        id: &TaskId,
        text: &str,
    ) -> Result<Thought, OrchestratorError> {
        self.storage
            .append_thought(id, text)
            .await
            .map_err(|e| OrchestratorError::from_storage(id, e))
    }

    /// Whether new submissions are accepted.
    pub async fn is_accepting(&self) -> bool {
        !self.queue.is_closed().await
    }

    /// Number of tasks waiting in the queue.
    pub async fn queue_depth(&self) -> usize {
        self.queue.len().await
    }
}
