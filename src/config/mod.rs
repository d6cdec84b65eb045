//! Configuration loading and parsing.
//!
//! This module provides YAML-based configuration for the server, the agent
//! command and the worker.

mod error;
mod types;
mod yaml;

pub use error::ConfigError;
pub use types::{
    AgentConfig, DEFAULT_CANCEL_GRACE_SECS, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT_SECS,
    ErrandConfig, ExecutionConfig, ServerConfig, WorkerConfig,
};
pub use yaml::ConfigLoader;
