//! Storage abstraction for task records.
//!
//! This module provides a trait-based repository for tasks with a pluggable
//! backend. Every mutation of a stored task goes through a single call so that
//! backends can apply it atomically.

mod memory;

pub use memory::InMemoryStorage;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::core::task::{Task, Thought, TransitionError};
use crate::core::types::TaskId;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested item was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A duplicate key was detected.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// A mutation tried to move a task's status backwards or sideways.
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// Storage lock was poisoned.
    #[error("storage lock poisoned")]
    LockPoisoned,
}

/// A read-modify-write applied to one stored task.
///
/// If the closure returns an error the stored record is left untouched.
pub type TaskMutation = Box<dyn FnOnce(&mut Task) -> Result<(), TransitionError> + Send>;

/// Storage trait for task records.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Save a new task.
    async fn save_task(&self, task: Task) -> Result<(), StorageError>;

    /// Get a task by ID.
    async fn get_task(&self, id: &TaskId) -> Result<Task, StorageError>;

    /// Snapshot of every task keyed by ID.
    async fn list_tasks(&self) -> Result<HashMap<TaskId, Task>, StorageError>;

    /// Delete a task by ID.
    async fn delete_task(&self, id: &TaskId) -> Result<(), StorageError>;

    /// Apply `mutation` to a task atomically and return the updated record.
    async fn update_task(&self, id: &TaskId, mutation: TaskMutation)
    -> Result<Task, StorageError>;

    /// Append a thought to a task's trail.
    async fn append_thought(&self, id: &TaskId, text: &str) -> Result<Thought, StorageError> {
        let text = text.to_string();
        let task = self
            .update_task(
                id,
                Box::new(move |task| {
                    task.add_thought(text);
                    Ok(())
                }),
            )
            .await?;
        task.thoughts
            .last()
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("thought for task: {}", id)))
    }
}
