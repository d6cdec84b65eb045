//! Bounded, cancellable agent invocation.
//!
//! The supervisor runs one agent call as its own Tokio task so it can be
//! aborted when the timeout elapses. After aborting it waits, up to a grace
//! period, for the task to acknowledge cancellation before reporting the
//! timeout.

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

use super::agent::{Agent, AgentError};
use super::log::read_agent_log;
use crate::core::task::AgentTrace;

/// Default limit for a single agent invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time to wait for an aborted invocation to wind down.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);

/// A successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// The agent's response.
    pub response: String,
    /// Parsed log artifact, empty when none was available.
    pub trace: AgentTrace,
}

/// Why an invocation did not produce a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionFailure {
    /// The agent did not answer within the limit.
    #[error("execution exceeded {} second timeout", .0.as_secs_f64())]
    Timeout(Duration),

    /// The agent returned an error or panicked.
    #[error("{message}")]
    Fault { message: String, trace: String },
}

impl From<AgentError> for ExecutionFailure {
    fn from(err: AgentError) -> Self {
        ExecutionFailure::Fault {
            message: err.to_string(),
            trace: err.trace(),
        }
    }
}

impl From<JoinError> for ExecutionFailure {
    fn from(err: JoinError) -> Self {
        if err.is_panic() {
            let message = panic_message(err.into_panic());
            ExecutionFailure::Fault {
                trace: format!("agent panicked: {}", message),
                message,
            }
        } else {
            ExecutionFailure::Fault {
                message: "agent invocation was cancelled".to_string(),
                trace: format!("{:?}", err),
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "agent panicked".to_string()
    }
}

/// Runs agent invocations under a timeout.
#[derive(Clone)]
pub struct ExecutionSupervisor {
    agent: Arc<dyn Agent>,
    log_path: Option<PathBuf>,
    timeout: Duration,
    cancel_grace: Duration,
}

impl ExecutionSupervisor {
    /// Create a supervisor with the default timeout and no log artifact.
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self {
            agent,
            log_path: None,
            timeout: DEFAULT_TIMEOUT,
            cancel_grace: DEFAULT_CANCEL_GRACE,
        }
    }

    /// Set the invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how long to wait for an aborted invocation to acknowledge.
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    /// Read the agent's log artifact from `path` after each success.
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cancel_grace(&self) -> Duration {
        self.cancel_grace
    }

    pub fn agent_name(&self) -> &str {
        self.agent.name()
    }

    /// Run the agent on `query`, bounded by the timeout.
    pub async fn invoke(&self, query: &str) -> Result<Execution, ExecutionFailure> {
        let agent = Arc::clone(&self.agent);
        let query = query.to_string();
        let mut handle = tokio::spawn(async move { agent.invoke(&query).await });

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(Ok(response))) => {
                let trace = self.read_trace().await;
                Ok(Execution { response, trace })
            }
            Ok(Ok(Err(err))) => Err(err.into()),
            Ok(Err(join_err)) => Err(join_err.into()),
            Err(_) => {
                handle.abort();
                self.await_cancellation(handle).await;
                Err(ExecutionFailure::Timeout(self.timeout))
            }
        }
    }

    async fn await_cancellation(&self, handle: JoinHandle<Result<String, AgentError>>) {
        match tokio::time::timeout(self.cancel_grace, handle).await {
            Ok(Err(err)) if err.is_cancelled() => {
                debug!(agent = %self.agent.name(), "Agent invocation cancelled");
            }
            Ok(Err(err)) => {
                warn!(agent = %self.agent.name(), error = %err, "Agent panicked while cancelling");
            }
            Ok(Ok(_)) => {
                debug!(agent = %self.agent.name(), "Agent finished before cancellation took effect");
            }
            Err(_) => {
                warn!(
                    agent = %self.agent.name(),
                    grace_secs = self.cancel_grace.as_secs_f64(),
                    "Agent did not acknowledge cancellation within grace period"
                );
            }
        }
    }

    async fn read_trace(&self) -> AgentTrace {
        let Some(path) = &self.log_path else {
            return AgentTrace::default();
        };
        match read_agent_log(path).await {
            Ok(trace) => trace,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read agent log");
                AgentTrace::default()
            }
        }
    }
}

impl std::fmt::Debug for ExecutionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionSupervisor")
            .field("agent", &self.agent.name())
            .field("log_path", &self.log_path)
            .field("timeout", &self.timeout)
            .field("cancel_grace", &self.cancel_grace)
            .finish()
    }
}
