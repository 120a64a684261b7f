//! Workflow definition types.
//!
//! A workflow is a named, versioned automation that consists of:
//! - Metadata (name, status, version, timestamps)
//! - Nodes and the connections between them
//! - The trigger node where every run starts

use crate::connection::Connection;
use crate::error::{GraphError, WorkflowError};
use crate::node::{Node, NodeId};
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use switchyard_core::WorkflowId;

/// Lifecycle status of a workflow definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Disabled,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Disabled => "disabled",
        };
        f.write_str(s)
    }
}

fn initial_version() -> u32 {
    1
}

/// A complete workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default)]
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub status: WorkflowStatus,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// The node every run starts from.
    pub trigger: NodeId,
    #[serde(default = "initial_version")]
    pub version: u32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Creates an empty draft workflow starting at `trigger`.
    #[must_use]
    pub fn new(name: impl Into<String>, trigger: impl Into<NodeId>) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::new(),
            name: name.into(),
            status: WorkflowStatus::Draft,
            nodes: Vec::new(),
            connections: Vec::new(),
            trigger: trigger.into(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Adds a node.
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Adds a connection.
    #[must_use]
    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = status;
        self
    }

    /// Parses a workflow document and validates its graph.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Parse` for malformed JSON and
    /// `WorkflowError::GraphOperation` wrapping the `GraphError` for
    /// structurally invalid workflows.
    pub fn from_json(json: &str) -> Result<Self, Report<WorkflowError>> {
        let workflow: Self = serde_json::from_str(json).map_err(|e| WorkflowError::Parse {
            reason: e.to_string(),
        })?;

        workflow.validate().map_err(|e| {
            Report::new(e).context(WorkflowError::GraphOperation {
                workflow_id: workflow.id,
            })
        })?;

        Ok(workflow)
    }

    /// Returns a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id.as_str() == id)
    }

    /// Returns the nodes flagged as error handlers.
    pub fn error_handlers(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.error_handler)
    }

    /// Returns whether runs of this workflow are expected.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == WorkflowStatus::Active
    }

    /// Checks the structural invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violation found: duplicate node ids, a missing
    /// trigger, or a connection referencing an unknown node.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(GraphError::DuplicateNode {
                    node_id: node.id.clone(),
                });
            }
        }

        if !seen.contains(self.trigger.as_str()) {
            return Err(GraphError::TriggerNotFound {
                node_id: self.trigger.clone(),
            });
        }

        for conn in &self.connections {
            if !seen.contains(conn.from.as_str()) {
                return Err(GraphError::ConnectionSourceNotFound {
                    from: conn.from.clone(),
                    to: conn.to.clone(),
                });
            }
            if !seen.contains(conn.to.as_str()) {
                return Err(GraphError::ConnectionTargetNotFound {
                    from: conn.from.clone(),
                    to: conn.to.clone(),
                });
            }
        }

        Ok(())
    }

    /// Records an edit: increments the version and bumps `updated_at`.
    pub fn bump_version(&mut self) {
        self.version += 1;
        self.touch();
    }

    /// Marks the workflow as updated (bumps updated_at timestamp).
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
