//! Connector trait, operation types and the connector registry.
//!
//! Integration nodes reach external services through connectors. A
//! connector receives one [`Operation`] per call, carrying the resolved
//! parameters and the credentials taken from the node's configuration.

use crate::error::ConnectorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Information about a connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorInfo {
    /// Unique identifier, matched against an integration node's `connector`.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    pub description: String,
    /// Available operations.
    pub operations: Vec<OperationInfo>,
    pub capabilities: Vec<ConnectorCapability>,
}

/// Information about an available operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationInfo {
    pub name: String,
    pub description: String,
    /// JSON schema for input parameters.
    pub input_schema: JsonValue,
}

/// Capabilities that a connector may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorCapability {
    /// Can read data from the service.
    Read,
    /// Can send or create data in the service.
    Write,
    /// Authenticates with credentials supplied per operation.
    Credentials,
}

/// An operation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Operation {
    /// The operation name.
    pub name: String,
    /// Operation parameters, already resolved against the run context.
    pub parameters: JsonValue,
    /// Credentials for this call only.
    #[serde(default, skip_serializing)]
    pub credentials: BTreeMap<String, String>,
}

impl Operation {
    /// Creates a new operation.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: JsonValue::Object(Default::default()),
            credentials: BTreeMap::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        if let JsonValue::Object(ref mut map) = self.parameters {
            map.insert(key.into(), value);
        }
        self
    }

    /// Sets all parameters at once.
    #[must_use]
    pub fn with_parameters(mut self, parameters: JsonValue) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the credentials for this call.
    #[must_use]
    pub fn with_credentials(mut self, credentials: BTreeMap<String, String>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Returns a string parameter, if present.
    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(JsonValue::as_str)
    }

    /// Returns a required credential.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::MissingCredential` if it is absent or blank.
    pub fn credential(&self, name: &str) -> Result<&str, ConnectorError> {
        self.credentials
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConnectorError::MissingCredential {
                name: name.to_string(),
            })
    }
}

/// The result of an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Output data (if successful).
    pub data: Option<JsonValue>,
    /// Error message (if failed).
    pub error: Option<String>,
    pub metadata: OperationMetadata,
}

/// Metadata about an operation execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationMetadata {
    /// Latency in milliseconds.
    pub latency_ms: u64,
    /// Number of API calls made.
    pub api_calls: u32,
}

impl OperationResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(data: JsonValue, metadata: OperationMetadata) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(error: impl Into<String>, metadata: OperationMetadata) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata,
        }
    }
}

/// Trait for integration connectors.
///
/// SMS, email, chat and payment services all plug in through this trait.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns information about this connector.
    fn info(&self) -> ConnectorInfo;

    /// Executes an operation.
    ///
    /// A service-level refusal is an `OperationResult` with `success`
    /// false; `Err` is reserved for failures to talk to the service at all.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation could not be performed.
    async fn execute(&self, operation: Operation) -> Result<OperationResult, ConnectorError>;

    /// Checks if the connection is healthy.
    async fn health_check(&self) -> Result<bool, ConnectorError>;

    /// Checks if this connector supports a specific capability.
    fn supports(&self, capability: ConnectorCapability) -> bool {
        self.info().capabilities.contains(&capability)
    }
}

/// Connectors keyed by id.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connector under its `info().id`, replacing any previous one.
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        let id = connector.info().id;
        self.connectors.insert(id, connector);
    }

    /// Registers a connector (builder form).
    #[must_use]
    pub fn with(mut self, connector: Arc<dyn Connector>) -> Self {
        self.register(connector);
        self
    }

    /// Looks up a connector.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::NotFound` for unregistered ids.
    pub fn get(&self, id: &str) -> Result<Arc<dyn Connector>, ConnectorError> {
        self.connectors
            .get(id)
            .cloned()
            .ok_or_else(|| ConnectorError::NotFound {
                connector: id.to_string(),
            })
    }

    /// Returns the registered ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.connectors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("connectors", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::ConsoleConnector;
    use serde_json::json;

    #[test]
    fn operation_builder() {
        let op = Operation::new("send_message")
            .with_param("to", json!("+15550100"))
            .with_param("text", json!("Your order shipped"));

        assert_eq!(op.name, "send_message");
        assert_eq!(op.param_str("to"), Some("+15550100"));
        assert_eq!(op.param_str("missing"), None);
    }

    #[test]
    fn credentials_are_required_and_not_serialized() {
        let op = Operation::new("send_message").with_credentials(BTreeMap::from([
            ("api_key".to_string(), "secret".to_string()),
            ("blank".to_string(), "  ".to_string()),
        ]));

        assert_eq!(op.credential("api_key"), Ok("secret"));
        assert_eq!(
            op.credential("blank"),
            Err(ConnectorError::MissingCredential {
                name: "blank".to_string()
            })
        );
        assert!(op.credential("token").is_err());

        let json = serde_json::to_value(&op).expect("serialize");
        assert!(json.get("credentials").is_none());
    }

    #[test]
    fn operation_result_failure() {
        let result = OperationResult::failure("recipient opted out", OperationMetadata::default());

        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.error.as_deref(), Some("recipient opted out"));
    }

    #[test]
    fn registry_lookup() {
        let registry = ConnectorRegistry::new().with(Arc::new(ConsoleConnector::new()));

        assert_eq!(registry.ids(), vec!["console"]);
        assert!(registry.get("console").is_ok());
        assert_eq!(
            registry.get("sms").err(),
            Some(ConnectorError::NotFound {
                connector: "sms".to_string()
            })
        );
    }
}
