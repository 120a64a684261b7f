use async_trait::async_trait;
use serde_json::Value as JsonValue;
use switchyard_workflow::{ExecutionContext, Node, NodeError, NodeHandler};

/// Entry point for webhook, manual and schedule triggers.
///
/// The trigger has already fired by the time the engine runs it, so the
/// handler just hands the run input to downstream nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerHandler;

#[async_trait]
impl NodeHandler for TriggerHandler {
    async fn execute(
        &self,
        _node: &Node,
        context: &ExecutionContext,
    ) -> Result<JsonValue, NodeError> {
        Ok(context.input.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchyard_workflow::NodeConfig;

    #[tokio::test]
    async fn passes_input_through() {
        let node = Node::new("start", "Start", NodeConfig::Manual);
        let context = ExecutionContext::new(json!({"orderId": 42}));

        let output = TriggerHandler.execute(&node, &context).await.expect("run");
        assert_eq!(output, json!({"orderId": 42}));
    }
}
