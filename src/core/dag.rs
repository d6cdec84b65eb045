//! Plan graph for multi-step agent work.
//!
//! A planner builds a `Dag` of steps, an executor updates node statuses as it
//! runs them, and the DAG answers which nodes are ready next. The DAG itself
//! never executes anything.
//!
//! Readiness follows the current cursor: with no current node the roots are
//! ready; otherwise the pending direct targets of the current node whose
//! dependency sources have all completed.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::types::NodeId;

/// Errors that can occur when working with DAGs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DagError {
    /// A referenced node does not exist.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// A cycle was detected in the graph.
    #[error("cycle detected involving node: {0}")]
    CycleDetected(NodeId),
}

/// Kind of plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    /// Invoke an automation tool.
    ToolCall,
    /// Ask the language model.
    Llm,
    /// Branch on a predicate.
    Condition,
}

/// Execution status of a plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// A node in the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Parameters interpreted by the executor.
    pub config: Value,
    pub status: NodeStatus,
    pub result: Option<Value>,
}

/// A directed acyclic plan graph.
#[derive(Debug, Clone, Default)]
pub struct Dag {
    /// Nodes in insertion order; a node's id is its index.
    nodes: Vec<DagNode>,

    /// Edges: source -> targets that depend on it.
    edges: BTreeMap<NodeId, Vec<NodeId>>,

    /// Reverse edges: target -> sources it depends on.
    dependencies: BTreeMap<NodeId, Vec<NodeId>>,

    current_node: Option<NodeId>,
}

impl Dag {
    /// Create a new empty DAG.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the DAG is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get the number of nodes in the DAG.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Append a pending node and return its id.
    pub fn add_node(&mut self, node_type: NodeType, config: Value) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(DagNode {
            id,
            node_type,
            config,
            status: NodeStatus::Pending,
            result: None,
        });
        id
    }

    /// Record that `to` depends on `from`.
    ///
    /// Both nodes must exist. Recording the same edge twice is a no-op.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), DagError> {
        self.ensure_exists(from)?;
        self.ensure_exists(to)?;

        let targets = self.edges.entry(from).or_default();
        if targets.contains(&to) {
            return Ok(());
        }
        targets.push(to);
        self.dependencies.entry(to).or_default().push(from);
        Ok(())
    }

    /// Get a node by id.
    pub fn node(&self, id: NodeId) -> Option<&DagNode> {
        self.nodes.get(id.index())
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> &[DagNode] {
        &self.nodes
    }

    /// Nodes that depend on `id`.
    pub fn targets_of(&self, id: NodeId) -> &[NodeId] {
        self.edges.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Nodes that `id` depends on.
    pub fn dependencies_of(&self, id: NodeId) -> &[NodeId] {
        self.dependencies
            .get(&id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// The node the executor last advanced from.
    pub fn current_node(&self) -> Option<NodeId> {
        self.current_node
    }

    /// Move the cursor to `id`.
    pub fn set_current(&mut self, id: NodeId) -> Result<(), DagError> {
        self.ensure_exists(id)?;
        self.current_node = Some(id);
        Ok(())
    }

    /// Reset the cursor so readiness falls back to the roots.
    pub fn clear_current(&mut self) {
        self.current_node = None;
    }

    /// Overwrite the status of a node.
    pub fn set_status(&mut self, id: NodeId, status: NodeStatus) -> Result<(), DagError> {
        self.node_mut(id)?.status = status;
        Ok(())
    }

    /// Mark a node completed and attach its result.
    pub fn complete_node(&mut self, id: NodeId, result: Value) -> Result<(), DagError> {
        let node = self.node_mut(id)?;
        node.status = NodeStatus::Completed;
        node.result = Some(result);
        Ok(())
    }

    /// Mark a node failed.
    pub fn fail_node(&mut self, id: NodeId) -> Result<(), DagError> {
        self.set_status(id, NodeStatus::Failed)
    }

    /// Nodes eligible to run next, in ascending id order.
    pub fn get_next_nodes(&self) -> Vec<NodeId> {
        match self.current_node {
            None => self
                .nodes
                .iter()
                .filter(|node| node.status == NodeStatus::Pending)
                .filter(|node| self.dependencies_of(node.id).is_empty())
                .map(|node| node.id)
                .collect(),
            Some(current) => {
                let mut ready: Vec<NodeId> = self
                    .targets_of(current)
                    .iter()
                    .copied()
                    .filter(|id| {
                        self.node(*id)
                            .is_some_and(|node| node.status == NodeStatus::Pending)
                    })
                    .filter(|id| self.dependencies_completed(*id))
                    .collect();
                ready.sort();
                ready
            }
        }
    }

    /// Whether every recorded dependency source of `id` has completed.
    pub fn dependencies_completed(&self, id: NodeId) -> bool {
        self.dependencies_of(id).iter().all(|dep| {
            self.node(*dep)
                .is_some_and(|node| node.status == NodeStatus::Completed)
        })
    }

    /// Return node ids in topological order.
    ///
    /// Returns an error if the edges contain a cycle.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, DagError> {
        // Kahn's algorithm
        let mut in_degree: Vec<usize> = self
            .nodes
            .iter()
            .map(|node| self.dependencies_of(node.id).len())
            .collect();

        let mut queue: VecDeque<NodeId> = self
            .nodes
            .iter()
            .filter(|node| in_degree[node.id.index()] == 0)
            .map(|node| node.id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for next in self.targets_of(id) {
                let degree = &mut in_degree[next.index()];
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*next);
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck = in_degree
                .iter()
                .position(|degree| *degree > 0)
                .map(NodeId::new)
                .unwrap_or_default();
            return Err(DagError::CycleDetected(stuck));
        }

        Ok(order)
    }

    fn ensure_exists(&self, id: NodeId) -> Result<(), DagError> {
        if id.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(DagError::NodeNotFound(id))
        }
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut DagNode, DagError> {
        self.nodes
            .get_mut(id.index())
            .ok_or(DagError::NodeNotFound(id))
    }
}
