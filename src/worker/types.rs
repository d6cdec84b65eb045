//! Worker type definitions.
//!
//! This module contains error types, state enums, and command types for the worker.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors that can occur when talking to the worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Channel error.
    #[error("channel error: {0}")]
    ChannelError(String),
}

/// State of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Waiting for the next task.
    Idle,
    /// Executing a task.
    Processing,
    /// No longer accepting tasks; finishing up.
    ShuttingDown,
    /// The loop has exited.
    Stopped,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Processing => "processing",
            WorkerState::ShuttingDown => "shutting_down",
            WorkerState::Stopped => "stopped",
        }
    }
}

/// What happens to queued tasks on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownMode {
    /// Finish every queued task before stopping.
    #[default]
    Drain,
    /// Finish the in-flight task only; queued tasks stay `Queued`.
    Abandon,
}

/// Commands that can be sent to the worker.
pub(crate) enum WorkerCommand {
    /// Stop the worker.
    Shutdown {
        mode: ShutdownMode,
        response: oneshot::Sender<()>,
    },
}
