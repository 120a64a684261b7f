use super::wrong_config;
use crate::connector::{Connector, ConnectorRegistry, Operation};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use switchyard_workflow::expression::{render, resolve_value};
use switchyard_workflow::{ExecutionContext, Node, NodeConfig, NodeError, NodeHandler, NodeType};
use tracing::{debug, instrument};

/// Runs a connector operation.
///
/// Parameters are resolved against the context. Credential values may be
/// templates too, so secrets can arrive with the run input.
#[derive(Debug, Clone)]
pub struct IntegrationHandler {
    connectors: Arc<ConnectorRegistry>,
}

impl IntegrationHandler {
    #[must_use]
    pub fn new(connectors: Arc<ConnectorRegistry>) -> Self {
        Self { connectors }
    }
}

#[async_trait]
impl NodeHandler for IntegrationHandler {
    #[instrument(skip(self, node, context), fields(node_id = %node.id))]
    async fn execute(&self, node: &Node, context: &ExecutionContext) -> Result<JsonValue, NodeError> {
        let NodeConfig::Integration(config) = &node.config else {
            return Err(wrong_config(node, NodeType::Integration));
        };
        let connector = self
            .connectors
            .get(&config.connector)
            .map_err(|e| NodeError::InvalidConfig {
                reason: e.to_string(),
            })?;

        let credentials: BTreeMap<String, String> = config
            .credentials
            .iter()
            .map(|(k, v)| (k.clone(), render(v, context)))
            .collect();
        let operation = Operation::new(&config.operation)
            .with_parameters(resolve_value(&config.parameters, context))
            .with_credentials(credentials);

        let result = connector
            .execute(operation)
            .await
            .map_err(|e| NodeError::External {
                service: config.connector.clone(),
                message: e.to_string(),
            })?;
        debug!(
            connector = %config.connector,
            operation = %config.operation,
            success = result.success,
            latency_ms = result.metadata.latency_ms,
            "Connector operation finished"
        );

        if !result.success {
            return Err(NodeError::External {
                service: config.connector.clone(),
                message: result
                    .error
                    .unwrap_or_else(|| format!("operation {} failed", config.operation)),
            });
        }
        Ok(result.data.unwrap_or(JsonValue::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{ConnectorInfo, OperationMetadata, OperationResult};
    use crate::connectors::ConsoleConnector;
    use crate::error::ConnectorError;
    use serde_json::json;
    use std::sync::Mutex;
    use switchyard_workflow::node::IntegrationConfig;

    /// Records operations and answers with a fixed outcome.
    #[derive(Default)]
    struct RecordingSms {
        seen: Mutex<Vec<Operation>>,
        refuse: bool,
    }

    #[async_trait]
    impl Connector for RecordingSms {
        fn info(&self) -> ConnectorInfo {
            ConnectorInfo {
                id: "sms".to_string(),
                name: "SMS".to_string(),
                description: String::new(),
                operations: Vec::new(),
                capabilities: Vec::new(),
            }
        }

        async fn execute(&self, operation: Operation) -> Result<OperationResult, ConnectorError> {
            self.seen.lock().unwrap().push(operation);
            if self.refuse {
                Ok(OperationResult::failure(
                    "recipient opted out",
                    OperationMetadata::default(),
                ))
            } else {
                Ok(OperationResult::success(
                    json!({"messageId": "m-1"}),
                    OperationMetadata::default(),
                ))
            }
        }

        async fn health_check(&self) -> Result<bool, ConnectorError> {
            Ok(true)
        }
    }

    fn node(connector: &str) -> Node {
        Node::new(
            "notify",
            "Notify",
            NodeConfig::Integration(IntegrationConfig {
                connector: connector.to_string(),
                operation: "send_sms".to_string(),
                parameters: json!({"to": "{{input.phone}}", "text": "Hi {{input.name}}"}),
                credentials: BTreeMap::from([(
                    "api_key".to_string(),
                    "{{input.apiKey}}".to_string(),
                )]),
            }),
        )
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new(json!({"phone": "+15550100", "name": "Ada", "apiKey": "k-1"}))
    }

    #[tokio::test]
    async fn resolves_parameters_and_credentials() {
        let sms = Arc::new(RecordingSms::default());
        let registry = ConnectorRegistry::new().with(sms.clone());
        let handler = IntegrationHandler::new(Arc::new(registry));

        let output = handler.execute(&node("sms"), &context()).await.expect("run");
        assert_eq!(output, json!({"messageId": "m-1"}));

        let seen = sms.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].name, "send_sms");
        assert_eq!(seen[0].parameters, json!({"to": "+15550100", "text": "Hi Ada"}));
        assert_eq!(seen[0].credential("api_key"), Ok("k-1"));
    }

    #[tokio::test]
    async fn refused_operation_fails_node() {
        let sms = Arc::new(RecordingSms {
            refuse: true,
            ..RecordingSms::default()
        });
        let handler = IntegrationHandler::new(Arc::new(ConnectorRegistry::new().with(sms)));

        let err = handler.execute(&node("sms"), &context()).await.unwrap_err();
        assert_eq!(
            err,
            NodeError::External {
                service: "sms".to_string(),
                message: "recipient opted out".to_string()
            }
        );
    }

    #[tokio::test]
    async fn unknown_connector_is_config_error() {
        let registry = ConnectorRegistry::new().with(Arc::new(ConsoleConnector::new()));
        let handler = IntegrationHandler::new(Arc::new(registry));

        let err = handler.execute(&node("fax"), &context()).await.unwrap_err();
        assert!(err.to_string().contains("connector not found: fax"));
    }
}
