//! Worker engine implementation.
//!
//! The worker is the single consumer of the task queue. For each id it pops it:
//! - Moves the task to `Processing`
//! - Runs the agent through the execution supervisor
//! - Writes the terminal state back to storage
//! - Emits lifecycle events
//!
//! One task executes at a time, in queue order. A failing task never stops
//! the loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::task::TaskFailure;
use crate::core::types::TaskId;
use crate::events::{Event, EventBus};
use crate::execution::{Execution, ExecutionFailure, ExecutionSupervisor};
use crate::queue::TaskQueue;
use crate::storage::{Storage, StorageError, TaskMutation};

use super::handle::{COMMAND_CHANNEL_BUFFER, WorkerHandle};
use super::types::{ShutdownMode, WorkerCommand, WorkerState};

const THOUGHT_STARTING: &str = "Starting task processing";
const THOUGHT_INITIALIZING: &str = "Initializing agent query";
const THOUGHT_COMPLETED: &str = "Query completed successfully";
const THOUGHT_TIMED_OUT: &str = "Task exceeded timeout limit";

/// Render a duration in whole seconds when it has no fractional part.
pub(crate) fn format_secs(duration: Duration) -> String {
    format!("{}", duration.as_secs_f64())
}

/// Background consumer of the task queue.
pub struct Worker<S: Storage> {
    storage: Arc<S>,
    queue: Arc<TaskQueue>,
    event_bus: Arc<EventBus>,
    supervisor: ExecutionSupervisor,
}

impl<S: Storage + 'static> Worker<S> {
    /// Create a worker over shared storage and queue.
    pub fn new(storage: Arc<S>, queue: Arc<TaskQueue>, supervisor: ExecutionSupervisor) -> Self {
        Self {
            storage,
            queue,
            event_bus: Arc::new(EventBus::new()),
            supervisor,
        }
    }

    /// Set the event bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Get the supervisor used for each task.
    pub fn supervisor(&self) -> &ExecutionSupervisor {
        &self.supervisor
    }

    /// Start the worker loop and return a handle for controlling it.
    pub fn start(self) -> (WorkerHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_BUFFER);
        let state = Arc::new(RwLock::new(WorkerState::Idle));
        let current_task = Arc::new(RwLock::new(None));

        let handle = WorkerHandle {
            command_tx,
            state: Arc::clone(&state),
            current_task: Arc::clone(&current_task),
        };

        let worker_task = tokio::spawn(async move {
            self.run(command_rx, state, current_task).await;
        });

        (handle, worker_task)
    }

    /// Main worker loop.
    async fn run(
        self,
        mut command_rx: mpsc::Receiver<WorkerCommand>,
        state: Arc<RwLock<WorkerState>>,
        current_task: Arc<RwLock<Option<TaskId>>>,
    ) {
        info!(
            agent = %self.supervisor.agent_name(),
            timeout_secs = self.supervisor.timeout().as_secs_f64(),
            "Worker started"
        );

        loop {
            tokio::select! {
                biased;

                Some(command) = command_rx.recv() => {
                    match command {
                        WorkerCommand::Shutdown { mode, response } => {
                            *state.write().await = WorkerState::ShuttingDown;
                            self.queue.close().await;

                            match mode {
                                ShutdownMode::Drain => {
                                    let pending = self.queue.len().await;
                                    info!(pending, "Draining task queue before shutdown");
                                    while let Some(id) = self.queue.pop().await {
                                        self.process_tracked(id, &state, &current_task).await;
                                    }
                                }
                                ShutdownMode::Abandon => {
                                    let dropped = self.queue.clear().await;
                                    info!(abandoned = dropped.len(), "Abandoned queued tasks on shutdown");
                                }
                            }

                            *state.write().await = WorkerState::Stopped;
                            let _ = response.send(());
                            break;
                        }
                    }
                }

                next = self.queue.pop() => {
                    match next {
                        Some(id) => self.process_tracked(id, &state, &current_task).await,
                        None => {
                            debug!("Task queue closed, worker exiting");
                            *state.write().await = WorkerState::Stopped;
                            break;
                        }
                    }
                }
            }
        }

        info!("Worker stopped");
    }

    async fn process_tracked(
        &self,
        id: TaskId,
        state: &RwLock<WorkerState>,
        current_task: &RwLock<Option<TaskId>>,
    ) {
        {
            let mut s = state.write().await;
            if *s == WorkerState::Idle {
                *s = WorkerState::Processing;
            }
        }
        *current_task.write().await = Some(id);

        self.process(id).await;

        *current_task.write().await = None;
        let mut s = state.write().await;
        if *s == WorkerState::Processing {
            *s = WorkerState::Idle;
        }
    }

    /// Run one task to a terminal state.
    async fn process(&self, id: TaskId) {
        let started = Instant::now();

        let task = match self
            .storage
            .update_task(
                &id,
                Box::new(|task| {
                    task.mark_processing()?;
                    task.add_thought(THOUGHT_STARTING);
                    Ok(())
                }),
            )
            .await
        {
            Ok(task) => task,
            Err(StorageError::NotFound(_)) => {
                debug!(task_id = %id, "Task deleted before processing, skipping");
                return;
            }
            Err(e) => {
                warn!(task_id = %id, error = %e, "Failed to mark task as processing");
                return;
            }
        };

        info!(task_id = %id, "Processing task");
        self.event_bus.emit(Event::task_started(id)).await;

        let timeout = self.supervisor.timeout();
        let note = format!(
            "Executing agent query with {}-second timeout",
            format_secs(timeout)
        );
        for text in [THOUGHT_INITIALIZING, note.as_str()] {
            if let Err(e) = self.storage.append_thought(&id, text).await {
                debug!(task_id = %id, error = %e, "Dropping thought for missing task");
            }
        }

        match self.supervisor.invoke(&task.description).await {
            Ok(Execution { response, trace }) => {
                let agent_log = (!trace.is_empty()).then_some(trace);
                self.finish(
                    &id,
                    Box::new(move |task| {
                        task.mark_completed(response, agent_log)?;
                        task.add_thought(THOUGHT_COMPLETED);
                        Ok(())
                    }),
                )
                .await;

                info!(task_id = %id, duration_ms = started.elapsed().as_millis() as u64, "Task completed");
                self.event_bus
                    .emit(Event::task_completed(id, started.elapsed()))
                    .await;
            }
            Err(ExecutionFailure::Timeout(limit)) => {
                let message = format!("Task exceeded {} second timeout limit", format_secs(limit));
                let failure = TaskFailure::new(message.clone());
                self.finish(
                    &id,
                    Box::new(move |task| {
                        task.mark_failed(failure)?;
                        task.add_thought(THOUGHT_TIMED_OUT);
                        Ok(())
                    }),
                )
                .await;

                warn!(task_id = %id, timeout_secs = limit.as_secs_f64(), "Task timed out");
                self.event_bus
                    .emit(Event::task_failed(id, message, true, started.elapsed()))
                    .await;
            }
            Err(ExecutionFailure::Fault { message, trace }) => {
                let failure =
                    TaskFailure::new(format!("Exception: {}", message)).with_trace(trace);
                let error = failure.message.clone();
                let thought = format!("Task failed with error: {}", message);
                self.finish(
                    &id,
                    Box::new(move |task| {
                        task.mark_failed(failure)?;
                        task.add_thought(thought);
                        Ok(())
                    }),
                )
                .await;

                warn!(task_id = %id, error = %message, "Task failed");
                self.event_bus
                    .emit(Event::task_failed(id, error, false, started.elapsed()))
                    .await;
            }
        }
    }

    /// Write a terminal update. A task deleted mid-flight is not recreated.
    async fn finish(&self, id: &TaskId, mutation: TaskMutation) {
        match self.storage.update_task(id, mutation).await {
            Ok(_) => {}
            Err(StorageError::NotFound(_)) => {
                debug!(task_id = %id, "Task deleted during processing, dropping result");
            }
            Err(e) => {
                warn!(task_id = %id, error = %e, "Failed to record task outcome");
            }
        }
    }
}
