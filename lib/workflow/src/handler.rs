//! Node handler contract and registry.
//!
//! Every node type is executed by a handler. The engine looks the handler up
//! by the node's type tag once per attempt, so a missing registration fails
//! the node through the normal retry path rather than aborting the engine.

use crate::context::ExecutionContext;
use crate::error::NodeError;
use crate::node::{Node, NodeType};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Executes one node type.
///
/// Handlers receive the context by shared reference; only the engine writes
/// to it. Template values in a node's config must be resolved against the
/// context before use. Handlers doing I/O should carry their own timeouts;
/// the engine's timeout is a backstop.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Runs the node and returns its result.
    async fn execute(&self, node: &Node, context: &ExecutionContext)
    -> Result<JsonValue, NodeError>;
}

/// Maps node types to their handlers.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<NodeType, Arc<dyn NodeHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, replacing any previous one for the type.
    pub fn register(&mut self, node_type: NodeType, handler: Arc<dyn NodeHandler>) {
        self.handlers.insert(node_type, handler);
    }

    /// Registers a handler (builder form).
    #[must_use]
    pub fn with(mut self, node_type: NodeType, handler: Arc<dyn NodeHandler>) -> Self {
        self.register(node_type, handler);
        self
    }

    /// Looks up the handler for a node type.
    ///
    /// # Errors
    ///
    /// Returns `NodeError::UnknownNodeType` for unrecognised tags and
    /// `NodeError::HandlerNotRegistered` when nothing is registered.
    pub fn get(&self, node_type: NodeType) -> Result<Arc<dyn NodeHandler>, NodeError> {
        if node_type == NodeType::Unknown {
            return Err(NodeError::UnknownNodeType);
        }
        self.handlers
            .get(&node_type)
            .cloned()
            .ok_or(NodeError::HandlerNotRegistered { node_type })
    }

    /// Returns whether a handler is registered for the type.
    #[must_use]
    pub fn contains(&self, node_type: NodeType) -> bool {
        self.handlers.contains_key(&node_type)
    }

    /// Returns the registered node types.
    #[must_use]
    pub fn node_types(&self) -> Vec<NodeType> {
        self.handlers.keys().copied().collect()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("node_types", &self.node_types())
            .finish()
    }
}
