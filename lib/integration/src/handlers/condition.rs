use super::wrong_config;
use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use switchyard_workflow::{
    ExecutionContext, Node, NodeConfig, NodeError, NodeHandler, NodeType, evaluate_guard,
};

/// Evaluates a condition and records the outcome.
///
/// An unparseable condition evaluates to false, as guards do.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionHandler;

#[async_trait]
impl NodeHandler for ConditionHandler {
    async fn execute(&self, node: &Node, context: &ExecutionContext) -> Result<JsonValue, NodeError> {
        let NodeConfig::Condition(config) = &node.config else {
            return Err(wrong_config(node, NodeType::Condition));
        };
        Ok(json!({ "result": evaluate_guard(&config.condition, context) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_workflow::node::ConditionConfig;

    fn node(condition: &str) -> Node {
        Node::new(
            "check",
            "Check",
            NodeConfig::Condition(ConditionConfig {
                condition: condition.to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn evaluates_against_context() {
        let context = ExecutionContext::new(json!({"amount": 250}));

        let output = ConditionHandler
            .execute(&node("amount > 100"), &context)
            .await
            .expect("run");
        assert_eq!(output, json!({"result": true}));

        let output = ConditionHandler
            .execute(&node("amount < 100"), &context)
            .await
            .expect("run");
        assert_eq!(output, json!({"result": false}));
    }

    #[tokio::test]
    async fn garbage_is_false() {
        let output = ConditionHandler
            .execute(&node("%%%"), &ExecutionContext::default())
            .await
            .expect("run");
        assert_eq!(output, json!({"result": false}));
    }
}
