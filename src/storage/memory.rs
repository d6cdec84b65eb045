//! In-memory storage implementation.
//!
//! Provides a thread-safe in-memory backend. Data is not persisted across
//! restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{Storage, StorageError, TaskMutation};
use crate::core::task::Task;
use crate::core::types::TaskId;

/// In-memory storage backend.
///
/// Every mutation holds the write lock for its whole read-modify-write, so
/// concurrent submitters and the worker never lose an update.
pub struct InMemoryStorage {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl InMemoryStorage {
    /// Create a new empty in-memory storage.
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn save_task(&self, task: Task) -> Result<(), StorageError> {
        let mut tasks = self.tasks.write().map_err(|_| StorageError::LockPoisoned)?;
        if tasks.contains_key(&task.id) {
            return Err(StorageError::DuplicateKey(format!("task: {}", task.id)));
        }
        tasks.insert(task.id, task);
        Ok(())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, StorageError> {
        let tasks = self.tasks.read().map_err(|_| StorageError::LockPoisoned)?;
        tasks
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("task: {}", id)))
    }

    async fn list_tasks(&self) -> Result<HashMap<TaskId, Task>, StorageError> {
        let tasks = self.tasks.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(tasks.clone())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), StorageError> {
        let mut tasks = self.tasks.write().map_err(|_| StorageError::LockPoisoned)?;
        tasks
            .remove(id)
            .ok_or_else(|| StorageError::NotFound(format!("task: {}", id)))?;
        Ok(())
    }

    async fn update_task(
        &self,
        id: &TaskId,
        mutation: TaskMutation,
    ) -> Result<Task, StorageError> {
        let mut tasks = self.tasks.write().map_err(|_| StorageError::LockPoisoned)?;
        let stored = tasks
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("task: {}", id)))?;

        // Mutate a copy so a rejected transition leaves the record as it was.
        let mut updated = stored.clone();
        mutation(&mut updated)?;
        *stored = updated.clone();
        Ok(updated)
    }
}
