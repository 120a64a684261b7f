//! Error types for the workflow crate.
//!
//! Errors are layered with rootcause:
//! - `GraphError`: structural problems in a workflow definition
//! - `ConditionError`: guards that cannot be parsed
//! - `NodeError`: a single handler attempt failing
//! - `ExecutionError`: conditions that unwind a running walk
//! - `StoreError`: execution record persistence
//! - `WorkflowError`: high-level operations (wraps lower errors via context)

use crate::node::{NodeId, NodeType};
use switchyard_core::{ExecutionId, WorkflowId};
use std::fmt;

/// Errors from validating a workflow graph.
///
/// These carry only graph-level information. Workflow context should be
/// added by the caller using `.context()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two nodes share the same id.
    DuplicateNode { node_id: NodeId },
    /// The declared trigger is not among the nodes.
    TriggerNotFound { node_id: NodeId },
    /// A connection starts at a node that does not exist.
    ConnectionSourceNotFound { from: NodeId, to: NodeId },
    /// A connection ends at a node that does not exist.
    ConnectionTargetNotFound { from: NodeId, to: NodeId },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateNode { node_id } => write!(f, "duplicate node id: {node_id}"),
            Self::TriggerNotFound { node_id } => write!(f, "trigger node not found: {node_id}"),
            Self::ConnectionSourceNotFound { from, to } => {
                write!(f, "connection {from} -> {to} starts at an unknown node")
            }
            Self::ConnectionTargetNotFound { from, to } => {
                write!(f, "connection {from} -> {to} ends at an unknown node")
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Errors from parsing a guard condition.
///
/// The walker never surfaces these; a guard that fails to parse is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    /// The guard was empty or whitespace.
    Empty,
    /// The guard is neither JSON nor a `<field> <op> <value>` comparison.
    Unrecognised { expression: String },
}

impl fmt::Display for ConditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty condition"),
            Self::Unrecognised { expression } => {
                write!(f, "unrecognised condition: {expression}")
            }
        }
    }
}

impl std::error::Error for ConditionError {}

/// Errors from a single node handler attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// The node's type tag was not recognised when the workflow was loaded.
    UnknownNodeType,
    /// No handler is registered for this node type.
    HandlerNotRegistered { node_type: NodeType },
    /// A required configuration value is missing or resolved to nothing.
    MissingConfig { field: String },
    /// The configuration is present but unusable.
    InvalidConfig { reason: String },
    /// The handler ran and failed.
    ExecutionFailed { message: String },
    /// An external service returned an error.
    External { service: String, message: String },
    /// The attempt did not finish within the timeout.
    Timeout { timeout_ms: u64 },
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNodeType => write!(f, "unknown node type"),
            Self::HandlerNotRegistered { node_type } => {
                write!(f, "no handler registered for node type {node_type}")
            }
            Self::MissingConfig { field } => write!(f, "missing configuration: {field}"),
            Self::InvalidConfig { reason } => write!(f, "invalid configuration: {reason}"),
            Self::ExecutionFailed { message } => write!(f, "{message}"),
            Self::External { service, message } => write!(f, "{service} error: {message}"),
            Self::Timeout { timeout_ms } => write!(f, "timed out after {timeout_ms}ms"),
        }
    }
}

impl std::error::Error for NodeError {}

/// Errors that stop a workflow walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The workflow failed validation before the walk started.
    InvalidWorkflow { reason: String },
    /// A node exhausted its attempts and was not allowed to continue.
    NodeFailed {
        node_id: NodeId,
        node_name: String,
        attempts: u32,
        reason: String,
        /// Walk path from the trigger to the failing node.
        path: Vec<NodeId>,
    },
    /// The walk went deeper than the configured limit.
    DepthExceeded { node_id: NodeId, max_depth: usize },
    /// The execution record was cancelled externally.
    Cancelled,
}

impl ExecutionError {
    /// Returns the walk path rendered as a stack, if this error has one.
    #[must_use]
    pub fn stack(&self) -> Option<String> {
        let Self::NodeFailed { path, .. } = self else {
            return None;
        };
        let frames: Vec<&str> = path.iter().map(NodeId::as_str).collect();
        Some(frames.join(" -> "))
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidWorkflow { reason } => write!(f, "invalid workflow: {reason}"),
            Self::NodeFailed {
                node_id,
                node_name,
                attempts,
                reason,
                ..
            } => write!(
                f,
                "node {node_name} ({node_id}) failed after {attempts} attempt(s): {reason}"
            ),
            Self::DepthExceeded { node_id, max_depth } => {
                write!(f, "walk depth exceeded {max_depth} at node {node_id}")
            }
            Self::Cancelled => write!(f, "execution cancelled"),
        }
    }
}

impl std::error::Error for ExecutionError {}

/// Errors from execution record stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record with this id.
    NotFound { id: ExecutionId },
    /// A record with this id already exists.
    AlreadyExists { id: ExecutionId },
    /// The stored revision differs from the one the writer held.
    Conflict {
        id: ExecutionId,
        expected: u64,
        actual: u64,
    },
    /// Underlying storage I/O failed.
    Io { message: String },
    /// A stored document could not be encoded or decoded.
    Serialization { message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "execution not found: {id}"),
            Self::AlreadyExists { id } => write!(f, "execution already exists: {id}"),
            Self::Conflict {
                id,
                expected,
                actual,
            } => write!(
                f,
                "revision conflict on {id}: expected {expected}, found {actual}"
            ),
            Self::Io { message } => write!(f, "storage I/O error: {message}"),
            Self::Serialization { message } => write!(f, "serialization error: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// High-level workflow errors.
///
/// Use these to add workflow context when wrapping lower-level errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// A workflow document could not be parsed.
    Parse { reason: String },
    /// Error in graph validation (use as context wrapper).
    GraphOperation { workflow_id: WorkflowId },
    /// Invalid execution state transition.
    InvalidStateTransition { from: String, to: String },
    /// Cancelling an execution failed (use as context wrapper).
    Cancellation { execution_id: ExecutionId },
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { reason } => write!(f, "failed to parse workflow: {reason}"),
            Self::GraphOperation { workflow_id } => {
                write!(f, "graph validation failed for workflow {workflow_id}")
            }
            Self::InvalidStateTransition { from, to } => {
                write!(f, "invalid state transition from {from} to {to}")
            }
            Self::Cancellation { execution_id } => {
                write!(f, "failed to cancel execution {execution_id}")
            }
        }
    }
}

impl std::error::Error for WorkflowError {}
