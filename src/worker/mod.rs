//! Background worker for task execution.
//!
//! This module provides the single consumer loop that binds the task queue,
//! the execution supervisor and storage together.

mod engine;
mod handle;
mod types;

pub use engine::Worker;
pub use handle::WorkerHandle;
pub use types::{ShutdownMode, WorkerError, WorkerState};
