//! Worker handle for controlling the worker.
//!
//! This module provides the `WorkerHandle` type that allows external control
//! of the background worker, and observation of what it is doing.

use std::sync::Arc;

use tokio::sync::{RwLock, mpsc, oneshot};

use crate::core::types::TaskId;

use super::types::{ShutdownMode, WorkerCommand, WorkerError, WorkerState};

/// Buffer size for the command channel between WorkerHandle and Worker.
pub(crate) const COMMAND_CHANNEL_BUFFER: usize = 8;

/// Handle for controlling the worker.
#[derive(Clone)]
pub struct WorkerHandle {
    pub(crate) command_tx: mpsc::Sender<WorkerCommand>,
    pub(crate) state: Arc<RwLock<WorkerState>>,
    pub(crate) current_task: Arc<RwLock<Option<TaskId>>>,
}

impl WorkerHandle {
    /// Helper to send a command that returns unit and wait for response.
    async fn send_unit_command(
        &self,
        build_command: impl FnOnce(oneshot::Sender<()>) -> WorkerCommand,
        operation: &str,
    ) -> Result<(), WorkerError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(build_command(response_tx))
            .await
            .map_err(|_| WorkerError::ChannelError(format!("failed to send {} command", operation)))?;

        response_rx.await.map_err(|_| {
            WorkerError::ChannelError(format!("failed to receive {} response", operation))
        })?;

        Ok(())
    }

    /// Shut the worker down.
    ///
    /// New submissions are rejected from this point on. The in-flight task
    /// always runs to a terminal state. Resolves once the loop has stopped.
    pub async fn shutdown(&self, mode: ShutdownMode) -> Result<(), WorkerError> {
        self.send_unit_command(
            |response| WorkerCommand::Shutdown { mode, response },
            "shutdown",
        )
        .await
    }

    /// Get the current worker state.
    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Id of the task being executed, if any.
    pub async fn current_task(&self) -> Option<TaskId> {
        *self.current_task.read().await
    }

    /// Check if the worker loop is still running.
    pub async fn is_running(&self) -> bool {
        !matches!(*self.state.read().await, WorkerState::Stopped)
    }
}
