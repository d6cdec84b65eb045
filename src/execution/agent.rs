//! The agent seam.
//!
//! An `Agent` turns a natural-language query into a response. The orchestrator
//! never looks inside an agent; it only bounds and supervises the call.

use async_trait::async_trait;
use thiserror::Error;

/// Errors an agent invocation can raise.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent process could not be started.
    #[error("failed to start agent: {0}")]
    Spawn(#[source] std::io::Error),

    /// The agent process exited unsuccessfully.
    #[error("agent exited with code {code}")]
    CommandFailed { code: i32, stderr: String },

    /// The agent reported a failure.
    #[error("agent failed: {0}")]
    Failed(String),

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AgentError {
    /// Diagnostic detail for this error: its debug form and source chain.
    pub fn trace(&self) -> String {
        let mut trace = format!("{:?}", self);
        if let AgentError::CommandFailed { stderr, .. } = self
            && !stderr.trim().is_empty()
        {
            trace.push_str("\nstderr:\n");
            trace.push_str(stderr.trim_end());
        }
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            trace.push_str(&format!("\ncaused by: {}", cause));
            source = cause.source();
        }
        trace
    }
}

/// An external reasoning agent.
///
/// Implementations must tolerate being cancelled: the supervisor drops the
/// invocation future when it times out.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str {
        "agent"
    }

    /// Run the agent on `query` and return its response.
    async fn invoke(&self, query: &str) -> Result<String, AgentError>;
}
