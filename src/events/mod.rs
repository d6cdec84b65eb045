//! Lifecycle events and event handling.
//!
//! The orchestrator and worker emit an event each time a task enters a new
//! status. Handlers registered on the `EventBus` observe them in order.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::core::types::TaskId;

/// Lifecycle events emitted while tasks move through the queue.
#[derive(Debug, Clone)]
pub enum Event {
    /// A task was accepted and queued.
    TaskQueued { task_id: TaskId, timestamp: Instant },

    /// The worker picked a task up.
    TaskStarted { task_id: TaskId, timestamp: Instant },

    /// The agent answered within the timeout.
    TaskCompleted {
        task_id: TaskId,
        duration: Duration,
        timestamp: Instant,
    },

    /// The task timed out or faulted.
    TaskFailed {
        task_id: TaskId,
        error: String,
        timed_out: bool,
        duration: Duration,
        timestamp: Instant,
    },
}

impl Event {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> Instant {
        match self {
            Event::TaskQueued { timestamp, .. } => *timestamp,
            Event::TaskStarted { timestamp, .. } => *timestamp,
            Event::TaskCompleted { timestamp, .. } => *timestamp,
            Event::TaskFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Id of the task the event is about.
    pub fn task_id(&self) -> TaskId {
        match self {
            Event::TaskQueued { task_id, .. }
            | Event::TaskStarted { task_id, .. }
            | Event::TaskCompleted { task_id, .. }
            | Event::TaskFailed { task_id, .. } => *task_id,
        }
    }

    /// Create a TaskQueued event.
    pub fn task_queued(task_id: TaskId) -> Self {
        Event::TaskQueued {
            task_id,
            timestamp: Instant::now(),
        }
    }

    /// Create a TaskStarted event.
    pub fn task_started(task_id: TaskId) -> Self {
        Event::TaskStarted {
            task_id,
            timestamp: Instant::now(),
        }
    }

    /// Create a TaskCompleted event.
    pub fn task_completed(task_id: TaskId, duration: Duration) -> Self {
        Event::TaskCompleted {
            task_id,
            duration,
            timestamp: Instant::now(),
        }
    }

    /// Create a TaskFailed event.
    pub fn task_failed(task_id: TaskId, error: String, timed_out: bool, duration: Duration) -> Self {
        Event::TaskFailed {
            task_id,
            error,
            timed_out,
            duration,
            timestamp: Instant::now(),
        }
    }
}

/// Handler for receiving lifecycle events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Event bus for distributing events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    /// Emit an event to all registered handlers.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Get the number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
