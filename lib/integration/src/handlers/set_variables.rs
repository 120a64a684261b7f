use super::wrong_config;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use switchyard_workflow::expression::resolve_map;
use switchyard_workflow::{ExecutionContext, Node, NodeConfig, NodeError, NodeHandler, NodeType};

/// Computes named values from the context.
///
/// A value that is exactly one `{{path}}` keeps the referenced value's type.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetVariablesHandler;

#[async_trait]
impl NodeHandler for SetVariablesHandler {
    async fn execute(&self, node: &Node, context: &ExecutionContext) -> Result<JsonValue, NodeError> {
        let NodeConfig::SetVariables(config) = &node.config else {
            return Err(wrong_config(node, NodeType::SetVariables));
        };
        Ok(JsonValue::Object(resolve_map(&config.values, context)))
    }
}
