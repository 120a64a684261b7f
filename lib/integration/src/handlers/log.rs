use super::wrong_config;
use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use switchyard_workflow::expression::render;
use switchyard_workflow::{
    ExecutionContext, LogLevel, Node, NodeConfig, NodeError, NodeHandler, NodeType,
};
use tracing::{debug, error, info, warn};

/// Renders a message and emits it as a tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHandler;

#[async_trait]
impl NodeHandler for LogHandler {
    async fn execute(&self, node: &Node, context: &ExecutionContext) -> Result<JsonValue, NodeError> {
        let NodeConfig::Log(config) = &node.config else {
            return Err(wrong_config(node, NodeType::Log));
        };
        let message = render(&config.message, context);
        match config.level {
            LogLevel::Debug => debug!(node_id = %node.id, "{message}"),
            LogLevel::Info => info!(node_id = %node.id, "{message}"),
            LogLevel::Warn => warn!(node_id = %node.id, "{message}"),
            LogLevel::Error => error!(node_id = %node.id, "{message}"),
        }
        Ok(json!({ "level": config.level, "message": message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_workflow::node::LogConfig;

    #[tokio::test]
    async fn renders_message() {
        let node = Node::new(
            "note",
            "Note",
            NodeConfig::Log(LogConfig {
                level: LogLevel::Warn,
                message: "Order {{input.id}} is late".to_string(),
            }),
        );
        let context = ExecutionContext::new(json!({"id": "A-17"}));

        let output = LogHandler.execute(&node, &context).await.expect("run");
        assert_eq!(
            output,
            json!({"level": "warn", "message": "Order A-17 is late"})
        );
    }
}
