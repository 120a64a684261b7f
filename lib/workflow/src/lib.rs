//! Workflow engine for the switchyard platform.
//!
//! This crate provides the workflow model and the engine that runs it:
//!
//! - **Definitions**: Workflows of typed nodes joined by guarded connections
//! - **Graph View**: petgraph index over a definition (order, cycles, reachability)
//! - **Context**: Per-run input and variable bag with dot-path lookup
//! - **Expressions**: `{{path}}` template resolution
//! - **Conditions**: JSON and infix guard evaluation
//! - **Handlers**: Registry of node handlers keyed by node type
//! - **Retry**: Per-node retry/timeout wrapper
//! - **Engine**: Depth-first walker with error-handler dispatch and cancellation
//! - **Execution Records**: Status lifecycle, audit log, revisioned stores

pub mod condition;
pub mod config;
pub mod connection;
pub mod context;
pub mod definition;
pub mod engine;
pub mod error;
pub mod execution;
pub mod expression;
pub mod graph;
pub mod handler;
pub mod node;
pub mod retry;
pub mod store;

pub use condition::{Condition, Operator, evaluate_guard};
pub use config::EngineConfig;
pub use connection::Connection;
pub use context::ExecutionContext;
pub use definition::{Workflow, WorkflowStatus};
pub use engine::Engine;
pub use error::{
    ConditionError, ExecutionError, GraphError, NodeError, StoreError, WorkflowError,
};
pub use execution::{
    ExecutionErrorSummary, ExecutionLog, ExecutionStatus, LogLevel, WorkflowExecution,
};
pub use graph::WorkflowGraph;
pub use handler::{HandlerRegistry, NodeHandler};
pub use node::{ExecutionConfig, Node, NodeConfig, NodeId, NodeType};
pub use retry::{NodeFailure, RetryPolicy};
pub use store::{ExecutionStore, FileExecutionStore, InMemoryExecutionStore, Revision};
