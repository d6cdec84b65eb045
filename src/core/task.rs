//! The task record and its lifecycle.
//!
//! A `Task` is one submitted unit of agent work. Its status only ever moves
//! forward: `Queued -> Processing -> Completed | Failed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::TaskId;

/// Agent version recorded on every new task.
pub const DEFAULT_AGENT_VERSION: &str = "1.0";

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the queue.
    Queued,
    /// Currently being executed by the worker.
    Processing,
    /// Agent returned a response.
    Completed,
    /// Execution timed out or faulted.
    Failed,
}

impl TaskStatus {
    /// Whether this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal forward transition.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Queued, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }

    /// Lowercase name used in API payloads and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition from {from:?} to {to:?}")]
pub struct TransitionError {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Informational priority. Never consulted for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Informational metadata attached to every task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub agent_version: String,
    pub priority: Priority,
    pub retry_count: u32,
}

impl Default for TaskMetadata {
    fn default() -> Self {
        Self {
            agent_version: DEFAULT_AGENT_VERSION.to_string(),
            priority: Priority::default(),
            retry_count: 0,
        }
    }
}

/// One entry of a task's thought trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thought {
    /// 1-based position in the trail.
    pub step: u32,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Error recorded on a failed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// Human-readable message.
    pub message: String,
    /// Raw diagnostic detail, kept separate from the message.
    pub trace: Option<String>,
}

impl TaskFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }
}

/// Sections parsed out of the agent's log artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTrace {
    pub task_log: String,
    pub planner_response: String,
    pub agent_scratchpad: String,
}

impl AgentTrace {
    /// True when no section carried any text.
    pub fn is_empty(&self) -> bool {
        self.task_log.is_empty()
            && self.planner_response.is_empty()
            && self.agent_scratchpad.is_empty()
    }
}

/// A submitted unit of work and its tracked lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub error: Option<TaskFailure>,
    pub agent_log: Option<AgentTrace>,
    pub thoughts: Vec<Thought>,
    pub metadata: TaskMetadata,
}

impl Task {
    /// Create a queued task with a fresh id.
    ///
    /// Callers validate the description; see `Orchestrator::create_task`.
    pub fn new(description: impl Into<String>) -> Self {
        Self::with_id(TaskId::new(), description)
    }

    /// Create a queued task with a known id.
    pub fn with_id(id: TaskId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            status: TaskStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            agent_log: None,
            thoughts: Vec::new(),
            metadata: TaskMetadata::default(),
        }
    }

    /// Append a thought, numbering it after the last one.
    pub fn add_thought(&mut self, text: impl Into<String>) -> &Thought {
        let step = self.thoughts.len() as u32 + 1;
        self.thoughts.push(Thought {
            step,
            text: text.into(),
            timestamp: Utc::now(),
        });
        &self.thoughts[self.thoughts.len() - 1]
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Mark the task as picked up by the worker.
    pub fn mark_processing(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Processing)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the task as completed with the agent's response.
    pub fn mark_completed(
        &mut self,
        result: impl Into<String>,
        agent_log: Option<AgentTrace>,
    ) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Completed)?;
        self.result = Some(result.into());
        self.agent_log = agent_log;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the task as failed.
    pub fn mark_failed(&mut self, failure: TaskFailure) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Failed)?;
        self.error = Some(failure);
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}
