//! FIFO queue of task ids waiting for the worker.
//!
//! Any number of submitters push; exactly one worker pops. `pop` suspends while
//! the queue is empty. Closing the queue rejects further pushes, and `pop`
//! keeps handing out what is left before returning `None`.

use std::collections::VecDeque;

use thiserror::Error;
use tokio::sync::{Mutex, Notify};

use crate::core::types::TaskId;

/// Errors returned by queue operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The queue no longer accepts new ids.
    #[error("task queue is closed")]
    Closed,
}

struct QueueState {
    items: VecDeque<TaskId>,
    closed: bool,
}

/// Unbounded FIFO of pending task ids.
pub struct TaskQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl TaskQueue {
    /// Create an empty, open queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Append an id to the back of the queue.
    pub async fn push(&self, id: TaskId) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(QueueError::Closed);
        }
        state.items.push_back(id);
        drop(state);

        self.notify.notify_one();
        Ok(())
    }

    /// Take the id at the front, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub async fn pop(&self) -> Option<TaskId> {
        loop {
            // Register interest before checking so a push between the check
            // and the await is not missed.
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().await;
                if let Some(id) = state.items.pop_front() {
                    return Some(id);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Stop accepting new ids and wake any waiting consumer.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    /// Drop every pending id, returning the ids that were dropped.
    pub async fn clear(&self) -> Vec<TaskId> {
        self.state.lock().await.items.drain(..).collect()
    }

    /// Whether `close` has been called.
    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Number of pending ids.
    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    /// Whether no ids are pending.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
