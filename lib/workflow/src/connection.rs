//! Connections between workflow nodes.
//!
//! A connection is a directed link from one node to another with an
//! optional guard. The walker follows a node's outbound connections in
//! declaration order and skips any whose guard evaluates false.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// A directed link between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// The upstream node.
    pub from: NodeId,
    /// The downstream node.
    pub to: NodeId,
    /// Guard expression, in JSON or infix form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Connection {
    /// Creates an unconditional connection.
    #[must_use]
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: None,
        }
    }

    /// Sets the guard expression.
    #[must_use]
    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}
