//! Connector that logs operations instead of performing them.

use crate::connector::{
    Connector, ConnectorCapability, ConnectorInfo, Operation, OperationMetadata, OperationResult,
};
use crate::error::ConnectorError;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

/// Accepts any operation, logs it and echoes it back. Used for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleConnector;

impl ConsoleConnector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for ConsoleConnector {
    fn info(&self) -> ConnectorInfo {
        ConnectorInfo {
            id: "console".to_string(),
            name: "Console".to_string(),
            description: "Logs operations without contacting any service".to_string(),
            operations: Vec::new(),
            capabilities: vec![ConnectorCapability::Write],
        }
    }

    async fn execute(&self, operation: Operation) -> Result<OperationResult, ConnectorError> {
        info!(
            operation = %operation.name,
            parameters = %operation.parameters,
            "Console connector operation"
        );
        Ok(OperationResult::success(
            json!({
                "operation": operation.name,
                "parameters": operation.parameters,
            }),
            OperationMetadata::default(),
        ))
    }

    async fn health_check(&self) -> Result<bool, ConnectorError> {
        Ok(true)
    }
}
