//! API request and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::task::{AgentTrace, Task, TaskMetadata, Thought};
use crate::core::types::TaskId;
use crate::worker::WorkerState;

fn to_rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339()
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Worker state response.
#[derive(Debug, Serialize)]
pub struct WorkerStateResponse {
    pub state: String,
    pub current_task: Option<String>,
    pub queue_depth: usize,
    pub accepting: bool,
}

impl WorkerStateResponse {
    pub fn new(
        state: WorkerState,
        current_task: Option<TaskId>,
        queue_depth: usize,
        accepting: bool,
    ) -> Self {
        Self {
            state: state.as_str().to_string(),
            current_task: current_task.map(|id| id.to_string()),
            queue_depth,
            accepting,
        }
    }
}

/// Body of a task submission.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub query: String,
}

/// Submission response.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub task_id: String,
    pub status: String,
    pub date: String,
}

impl From<&Task> for SubmitResponse {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.to_string(),
            status: task.status.as_str().to_string(),
            date: to_rfc3339(task.created_at),
        }
    }
}

/// Task summary for list responses.
#[derive(Debug, Serialize)]
pub struct TaskSummaryResponse {
    pub task_id: String,
    pub task_description: String,
    pub status: String,
    pub result: Option<String>,
    pub date: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error_message: Option<String>,
}

impl From<&Task> for TaskSummaryResponse {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.to_string(),
            task_description: task.description.clone(),
            status: task.status.as_str().to_string(),
            result: task.result.clone(),
            date: to_rfc3339(task.created_at),
            started_at: task.started_at.map(to_rfc3339),
            completed_at: task.completed_at.map(to_rfc3339),
            error_message: task.error.as_ref().map(|e| e.message.clone()),
        }
    }
}

/// Map of tasks keyed by id.
#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: HashMap<String, TaskSummaryResponse>,
    pub count: usize,
}

impl From<&HashMap<TaskId, Task>> for TaskListResponse {
    fn from(tasks: &HashMap<TaskId, Task>) -> Self {
        let tasks: HashMap<String, TaskSummaryResponse> = tasks
            .iter()
            .map(|(id, task)| (id.to_string(), TaskSummaryResponse::from(task)))
            .collect();
        let count = tasks.len();
        Self { tasks, count }
    }
}

/// Full task view.
#[derive(Debug, Serialize)]
pub struct TaskDetailResponse {
    pub task_id: String,
    pub task_description: String,
    pub status: String,
    pub date: String,
    pub result: Option<String>,
    pub thoughts: Vec<Thought>,
    pub agent_log: Option<AgentTrace>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error_message: Option<String>,
    pub error_trace: Option<String>,
    pub metadata: TaskMetadata,
}

impl From<Task> for TaskDetailResponse {
    fn from(task: Task) -> Self {
        let (error_message, error_trace) = match task.error {
            Some(failure) => (Some(failure.message), failure.trace),
            None => (None, None),
        };
        Self {
            task_id: task.id.to_string(),
            task_description: task.description,
            status: task.status.as_str().to_string(),
            date: to_rfc3339(task.created_at),
            result: task.result,
            thoughts: task.thoughts,
            agent_log: task.agent_log,
            started_at: task.started_at.map(to_rfc3339),
            completed_at: task.completed_at.map(to_rfc3339),
            error_message,
            error_trace,
            metadata: task.metadata,
        }
    }
}

/// Simple message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
