//! Configuration type definitions.
//!
//! This module contains the sections of `errand.yaml`: the HTTP server, the
//! agent command, execution limits and worker shutdown behaviour.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::error::ConfigError;
use crate::execution::{CommandAgent, ExecutionSupervisor};
use crate::worker::ShutdownMode;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8565;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CANCEL_GRACE_SECS: u64 = 5;

/// Top-level configuration (errand.yaml).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrandConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// External agent command.
    pub agent: AgentConfig,
    /// Execution limits.
    pub execution: ExecutionConfig,
    /// Worker behaviour.
    pub worker: WorkerConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// External agent command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Program to run. The query is appended as the last argument.
    pub program: Option<String>,
    /// Arguments placed before the query.
    pub args: Vec<String>,
    /// Environment variables for the agent process.
    pub env: HashMap<String, String>,
    /// Working directory for the agent process.
    pub working_dir: Option<PathBuf>,
    /// Log artifact the agent writes, parsed after each successful run.
    pub log_path: Option<PathBuf>,
}

/// Execution limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Hard limit for one agent invocation.
    pub timeout_secs: u64,
    /// How long to wait for a timed out invocation to wind down.
    pub cancel_grace_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            cancel_grace_secs: DEFAULT_CANCEL_GRACE_SECS,
        }
    }
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(self.cancel_grace_secs)
    }
}

/// Worker behaviour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// What to do with queued tasks on shutdown.
    pub shutdown: ShutdownMode,
}

impl ErrandConfig {
    /// Address the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Build the command agent described by the `agent` section.
    pub fn build_agent(&self) -> Result<CommandAgent, ConfigError> {
        let program = self
            .agent
            .program
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField("agent.program".into()))?;

        let mut builder = CommandAgent::builder(program).args(self.agent.args.iter().cloned());
        for (key, value) in &self.agent.env {
            builder = builder.env(key, value);
        }
        if let Some(dir) = &self.agent.working_dir {
            builder = builder.working_dir(dir);
        }
        Ok(builder.build())
    }

    /// Build a supervisor around the configured agent.
    pub fn build_supervisor(&self) -> Result<ExecutionSupervisor, ConfigError> {
        let agent = self.build_agent()?;
        let mut supervisor = ExecutionSupervisor::new(Arc::new(agent))
            .with_timeout(self.execution.timeout())
            .with_cancel_grace(self.execution.cancel_grace());
        if let Some(path) = &self.agent.log_path {
            supervisor = supervisor.with_log_path(path);
        }
        Ok(supervisor)
    }
}
