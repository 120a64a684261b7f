//! Graph view over a workflow definition, using petgraph.
//!
//! The definition stores nodes and connections as flat lists; this view
//! indexes them for the walker:
//! - Outbound connections per node, in declaration order
//! - Cycle detection
//! - Reachability from the trigger

use crate::connection::Connection;
use crate::definition::Workflow;
use crate::error::GraphError;
use crate::node::{Node, NodeId};
use petgraph::Direction;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use std::collections::HashMap;

/// A validated, indexed view of a workflow's graph.
///
/// Node weights borrow the workflow's nodes; edge weights are indices into
/// `Workflow::connections` so declaration order can be recovered.
#[derive(Debug)]
pub struct WorkflowGraph<'a> {
    workflow: &'a Workflow,
    graph: DiGraph<&'a Node, usize>,
    node_index_map: HashMap<&'a str, NodeIndex>,
}

impl<'a> WorkflowGraph<'a> {
    /// Validates the workflow and builds the view.
    ///
    /// # Errors
    ///
    /// Returns the first structural violation found by `Workflow::validate`.
    pub fn build(workflow: &'a Workflow) -> Result<Self, GraphError> {
        workflow.validate()?;

        let mut graph = DiGraph::with_capacity(workflow.nodes.len(), workflow.connections.len());
        let mut node_index_map = HashMap::with_capacity(workflow.nodes.len());
        for node in &workflow.nodes {
            let index = graph.add_node(node);
            node_index_map.insert(node.id.as_str(), index);
        }

        for (position, conn) in workflow.connections.iter().enumerate() {
            let (Some(&source), Some(&target)) = (
                node_index_map.get(conn.from.as_str()),
                node_index_map.get(conn.to.as_str()),
            ) else {
                continue;
            };
            graph.add_edge(source, target, position);
        }

        Ok(Self {
            workflow,
            graph,
            node_index_map,
        })
    }

    /// Returns a node by id.
    #[must_use]
    pub fn node(&self, node_id: &str) -> Option<&'a Node> {
        let index = self.node_index_map.get(node_id)?;
        self.graph.node_weight(*index).copied()
    }

    /// Returns the outbound connections of a node in declaration order.
    #[must_use]
    pub fn outgoing(&self, node_id: &str) -> Vec<&'a Connection> {
        let Some(&index) = self.node_index_map.get(node_id) else {
            return Vec::new();
        };

        let mut positions: Vec<usize> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .map(|edge| *edge.weight())
            .collect();
        positions.sort_unstable();

        positions
            .into_iter()
            .filter_map(|p| self.workflow.connections.get(p))
            .collect()
    }

    /// Returns whether any connection path loops back on itself.
    #[must_use]
    pub fn is_cyclic(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Returns the ids of nodes the walker can never reach.
    ///
    /// Error handlers are excluded; they are invoked by the dispatcher, not
    /// by following connections.
    #[must_use]
    pub fn unreachable_from_trigger(&self) -> Vec<&'a NodeId> {
        let Some(&start) = self.node_index_map.get(self.workflow.trigger.as_str()) else {
            return Vec::new();
        };

        let mut reached = vec![false; self.graph.node_count()];
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(index) = dfs.next(&self.graph) {
            reached[index.index()] = true;
        }

        self.graph
            .node_indices()
            .filter(|index| !reached[index.index()])
            .filter_map(|index| self.graph.node_weight(index).copied())
            .filter(|node| !node.error_handler)
            .map(|node| &node.id)
            .collect()
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }
}
