pub mod api;
pub mod config;
pub mod core;
pub mod events;
pub mod execution;
pub mod orchestrator;
pub mod queue;
pub mod storage;
pub mod testing;
pub mod worker;

pub use config::{ConfigError, ConfigLoader, ErrandConfig};
pub use core::dag::{Dag, DagError, DagNode, NodeStatus, NodeType};
pub use core::task::{AgentTrace, Priority, Task, TaskFailure, TaskMetadata, TaskStatus, Thought};
pub use core::types::{NodeId, TaskId};
pub use events::{Event, EventBus, EventHandler};
pub use execution::{
    Agent, AgentError, CommandAgent, CommandAgentBuilder, Execution, ExecutionFailure,
    ExecutionSupervisor,
};
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use queue::{QueueError, TaskQueue};
pub use storage::{InMemoryStorage, Storage, StorageError};
pub use worker::{ShutdownMode, Worker, WorkerError, WorkerHandle, WorkerState};
