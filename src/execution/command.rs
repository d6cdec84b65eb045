//! Agent backed by an external command.
//!
//! The query is passed as the last argument; the trimmed stdout is the
//! response. The child is killed when the invocation is dropped, so a timed
//! out invocation does not leave a process behind.
//!
//! ```rust
//! use errand::CommandAgent;
//!
//! let agent = CommandAgent::builder("python")
//!     .args(["-m", "tiny_agent.run"])
//!     .env("AGENT_CONFIG", "config.json")
//!     .working_dir("/opt/agent")
//!     .build();
//! assert_eq!(agent.program(), "python");
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use super::agent::{Agent, AgentError};

/// An agent that runs an external program.
#[derive(Debug, Clone)]
pub struct CommandAgent {
    /// Program to execute
    program: String,
    /// Arguments placed before the query
    args: Vec<String>,
    /// Environment variables
    env: HashMap<String, String>,
    /// Working directory
    working_dir: Option<PathBuf>,
}

impl CommandAgent {
    /// Create a new builder for a command agent.
    pub fn builder(program: impl Into<String>) -> CommandAgentBuilder {
        CommandAgentBuilder::new(program)
    }

    /// Get the program being executed.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the arguments placed before the query.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Get the working directory.
    pub fn working_dir(&self) -> Option<&PathBuf> {
        self.working_dir.as_ref()
    }
}

#[async_trait]
impl Agent for CommandAgent {
    fn name(&self) -> &str {
        &self.program
    }

    async fn invoke(&self, query: &str) -> Result<String, AgentError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(query);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output = cmd.output().await.map_err(AgentError::Spawn)?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(AgentError::CommandFailed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }
}

/// Builder for creating `CommandAgent` instances.
#[derive(Debug, Clone)]
pub struct CommandAgentBuilder {
    program: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    working_dir: Option<PathBuf>,
}

impl CommandAgentBuilder {
    /// Create a new builder with the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add a single environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Build the command agent.
    pub fn build(self) -> CommandAgent {
        CommandAgent {
            program: self.program,
            args: self.args,
            env: self.env,
            working_dir: self.working_dir,
        }
    }
}
