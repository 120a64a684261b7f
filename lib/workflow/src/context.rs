//! Per-run execution context.
//!
//! The context holds the run input and a variable bag. Each successful node
//! stores its result under its node id; later nodes and guards read it back
//! through dot paths. The context lives only for one run and is never
//! persisted.

use crate::node::Node;
use serde_json::{Map, Value as JsonValue, json};
use switchyard_core::{ExecutionId, WorkflowId};

/// Variable holding `{message, nodeId}` of the most recent terminal failure.
pub const ERROR_KEY: &str = "$error";
/// Variable holding `{id, name, type}` of the node that failed.
pub const FAILED_NODE_KEY: &str = "$failedNode";
/// Variable holding the workflow id, set for error handlers.
pub const WORKFLOW_ID_KEY: &str = "$workflowId";
/// Variable holding the execution id, set for error handlers.
pub const EXECUTION_ID_KEY: &str = "$executionId";

const INPUT_SCOPE: &str = "input";
const VARIABLES_SCOPE: &str = "variables";

/// Input payload and variable bag for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    /// The payload the run was started with.
    pub input: JsonValue,
    /// Results and computed values, keyed by node id or variable name.
    pub variables: Map<String, JsonValue>,
}

impl ExecutionContext {
    /// Creates a context for a new run.
    #[must_use]
    pub fn new(input: JsonValue) -> Self {
        Self {
            input,
            variables: Map::new(),
        }
    }

    /// Stores a node's result. A later write to the same key wins.
    pub fn set_result(&mut self, key: impl Into<String>, value: JsonValue) {
        self.variables.insert(key.into(), value);
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn result(&self, key: &str) -> Option<&JsonValue> {
        self.variables.get(key)
    }

    /// Resolves a dot path against the context.
    ///
    /// `input.` and `variables.` prefixes scope the lookup explicitly.
    /// Otherwise the first segment is looked up in the variables first,
    /// then in the top level of the input. Numeric segments index arrays.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&JsonValue> {
        let mut segments = path.split('.');
        let head = segments.next()?;
        let rest: Vec<&str> = segments.collect();

        match head {
            INPUT_SCOPE if !rest.is_empty() || !self.variables.contains_key(INPUT_SCOPE) => {
                descend(&self.input, &rest)
            }
            VARIABLES_SCOPE if !rest.is_empty() => {
                let (first, tail) = rest.split_first()?;
                descend(self.variables.get(*first)?, tail)
            }
            _ => {
                if let Some(value) = self.variables.get(head) {
                    return descend(value, &rest);
                }
                descend(self.input.as_object()?.get(head)?, &rest)
            }
        }
    }

    /// Records a terminal node failure so successors can inspect it.
    pub fn record_failure(&mut self, node: &Node, message: &str) {
        self.variables.insert(
            ERROR_KEY.to_string(),
            json!({"message": message, "nodeId": node.id}),
        );
        self.variables.insert(FAILED_NODE_KEY.to_string(), failed_node(node));
    }

    /// Derives the context error handlers run with.
    ///
    /// The derived context copies the current variables and input and adds
    /// the failure details plus the workflow and execution ids.
    #[must_use]
    pub fn for_error_handler(
        &self,
        failed: &Node,
        message: &str,
        workflow_id: WorkflowId,
        execution_id: ExecutionId,
    ) -> Self {
        let mut derived = self.clone();
        derived.record_failure(failed, message);
        derived.variables.insert(
            WORKFLOW_ID_KEY.to_string(),
            JsonValue::String(workflow_id.to_string()),
        );
        derived.variables.insert(
            EXECUTION_ID_KEY.to_string(),
            JsonValue::String(execution_id.to_string()),
        );
        derived
    }
}

fn failed_node(node: &Node) -> JsonValue {
    json!({
        "id": node.id,
        "name": node.name,
        "type": node.node_type().as_str(),
    })
}

fn descend<'v>(mut value: &'v JsonValue, segments: &[&str]) -> Option<&'v JsonValue> {
    for segment in segments {
        value = match value {
            JsonValue::Object(map) => map.get(*segment)?,
            JsonValue::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeConfig;

    fn context() -> ExecutionContext {
        let mut ctx = ExecutionContext::new(json!({
            "status": "active",
            "order": {"id": 42, "items": [{"sku": "A-1"}, {"sku": "B-2"}]}
        }));
        ctx.set_result("fetch", json!({"result": {"total": 99.5}}));
        ctx.set_result("status", json!("overridden"));
        ctx
    }

    #[test]
    fn variables_shadow_input_at_top_level() {
        let ctx = context();
        assert_eq!(ctx.lookup("status"), Some(&json!("overridden")));
        assert_eq!(ctx.lookup("input.status"), Some(&json!("active")));
        assert_eq!(ctx.lookup("variables.status"), Some(&json!("overridden")));
    }

    #[test]
    fn falls_back_to_input() {
        let ctx = context();
        assert_eq!(ctx.lookup("order.id"), Some(&json!(42)));
    }

    #[test]
    fn numeric_segments_index_arrays() {
        let ctx = context();
        assert_eq!(ctx.lookup("input.order.items.1.sku"), Some(&json!("B-2")));
        assert_eq!(ctx.lookup("order.items.9.sku"), None);
    }

    #[test]
    fn nested_results() {
        let ctx = context();
        assert_eq!(ctx.lookup("fetch.result.total"), Some(&json!(99.5)));
        assert_eq!(
            ctx.lookup("variables.fetch.result.total"),
            Some(&json!(99.5))
        );
        assert_eq!(ctx.lookup("fetch.result.missing"), None);
    }

    #[test]
    fn bare_input_is_the_whole_payload() {
        let ctx = ExecutionContext::new(json!({"a": 1}));
        assert_eq!(ctx.lookup("input"), Some(&json!({"a": 1})));
    }

    #[test]
    fn error_handler_context_carries_failure() {
        let ctx = context();
        let node = Node::new("charge", "Charge card", NodeConfig::Manual);
        let wf = WorkflowId::new();
        let exec = ExecutionId::new();

        let derived = ctx.for_error_handler(&node, "card declined", wf, exec);

        assert_eq!(
            derived.lookup("$error.message"),
            Some(&json!("card declined"))
        );
        assert_eq!(derived.lookup("$error.nodeId"), Some(&json!("charge")));
        assert_eq!(derived.lookup("$failedNode.type"), Some(&json!("manual")));
        assert_eq!(
            derived.lookup("$executionId"),
            Some(&json!(exec.to_string()))
        );
        assert_eq!(derived.lookup("fetch.result.total"), Some(&json!(99.5)));
        assert!(ctx.result(ERROR_KEY).is_none());
    }
}
