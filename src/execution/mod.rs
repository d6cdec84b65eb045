//! Agent invocation.
//!
//! This module contains:
//! - `Agent`: the seam to the external reasoning agent
//! - `CommandAgent`: an agent that runs an external program
//! - `ExecutionSupervisor`: bounds one invocation with a timeout
//! - Parsing of the agent's log artifact

mod agent;
mod command;
mod log;
mod supervisor;

pub use agent::{Agent, AgentError};
pub use command::{CommandAgent, CommandAgentBuilder};
pub use log::{DELIMITER_WIDTH, parse_agent_log, read_agent_log};
pub use supervisor::{
    DEFAULT_CANCEL_GRACE, DEFAULT_TIMEOUT, Execution, ExecutionFailure, ExecutionSupervisor,
};
