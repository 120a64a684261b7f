use super::wrong_config;
use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use std::time::Duration;
use switchyard_workflow::{ExecutionContext, Node, NodeConfig, NodeError, NodeHandler, NodeType};

/// Sleeps for the configured duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelayHandler;

#[async_trait]
impl NodeHandler for DelayHandler {
    async fn execute(&self, node: &Node, _context: &ExecutionContext) -> Result<JsonValue, NodeError> {
        let NodeConfig::Delay(config) = &node.config else {
            return Err(wrong_config(node, NodeType::Delay));
        };
        tokio::time::sleep(Duration::from_millis(config.duration_ms)).await;
        Ok(json!({ "delayedMs": config.duration_ms }))
    }
}
