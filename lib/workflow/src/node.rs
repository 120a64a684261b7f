//! Workflow node types and configurations.
//!
//! Nodes are the steps of a workflow. Each node has:
//! - An id, unique within its workflow
//! - A typed configuration; the `type` tag selects the handler that runs it
//! - An optional per-node execution policy (retries, timeout, continue-on-error)
//! - An error-handler flag for the error-trigger dispatcher

use crate::execution::LogLevel;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a node within a workflow.
///
/// Node ids are chosen by the workflow author and only need to be unique
/// inside one workflow, so they are plain strings rather than ULIDs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The type tag of a node, used to key the handler registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Webhook,
    Manual,
    Schedule,
    HttpRequest,
    Integration,
    AiGenerate,
    SetVariables,
    Delay,
    Log,
    Condition,
    /// A type tag this build does not recognise.
    Unknown,
}

impl NodeType {
    /// Returns the serialized tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Manual => "manual",
            Self::Schedule => "schedule",
            Self::HttpRequest => "http_request",
            Self::Integration => "integration",
            Self::AiGenerate => "ai_generate",
            Self::SetVariables => "set_variables",
            Self::Delay => "delay",
            Self::Log => "log",
            Self::Condition => "condition",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true for the entry-point node types.
    #[must_use]
    pub const fn is_trigger(&self) -> bool {
        matches!(self, Self::Webhook | Self::Manual | Self::Schedule)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for webhook trigger nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    /// The path the webhook is mounted on (e.g. "/hooks/orders").
    #[serde(default)]
    pub path: Option<String>,
}

/// Configuration for scheduled trigger nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    /// Cron expression (e.g. "0 7 * * *" for 7am daily).
    pub cron: String,
    /// Timezone for the schedule.
    #[serde(default)]
    pub timezone: Option<String>,
}

/// HTTP method for request nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    /// Returns the method name as sent on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

/// Configuration for outbound HTTP request nodes.
///
/// `url`, header values and query values are templates; `body` is resolved
/// as a direct value so a body of `"{{order}}"` sends the order object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestConfig {
    #[serde(default)]
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<JsonValue>,
    /// Per-request I/O timeout, independent of the engine's node timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Configuration for nodes that call an external service through a connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationConfig {
    /// The connector id (e.g. "console", "chat_webhook").
    pub connector: String,
    /// The operation to perform (e.g. "send_message").
    pub operation: String,
    /// Operation-specific parameters, resolved against the context.
    #[serde(default = "empty_object")]
    pub parameters: JsonValue,
    /// Per-call credentials (API keys, webhook URLs), resolved as templates.
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
}

/// Configuration for AI text generation nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiGenerateConfig {
    /// Prompt template.
    pub prompt: String,
    /// Optional system prompt template.
    #[serde(default)]
    pub system: Option<String>,
    /// Overrides the backend's default model.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

/// Configuration for nodes that publish computed values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVariablesConfig {
    pub values: Map<String, JsonValue>,
}

/// Configuration for delay nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayConfig {
    pub duration_ms: u64,
}

/// Configuration for log nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Message template.
    pub message: String,
}

/// Configuration for condition nodes.
///
/// The condition uses the same grammar as connection guards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionConfig {
    pub condition: String,
}

fn empty_object() -> JsonValue {
    JsonValue::Object(Map::new())
}

/// Configuration for a node, tagged by node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeConfig {
    Webhook(WebhookConfig),
    Manual,
    Schedule(ScheduleConfig),
    HttpRequest(HttpRequestConfig),
    Integration(IntegrationConfig),
    AiGenerate(AiGenerateConfig),
    SetVariables(SetVariablesConfig),
    Delay(DelayConfig),
    Log(LogConfig),
    Condition(ConditionConfig),
    /// Any type tag this build does not recognise. Kept so that loading a
    /// workflow never fails on a newer node type; running it fails the node.
    #[serde(other)]
    Unknown,
}

impl NodeConfig {
    /// Returns the type tag of this configuration.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Webhook(_) => NodeType::Webhook,
            Self::Manual => NodeType::Manual,
            Self::Schedule(_) => NodeType::Schedule,
            Self::HttpRequest(_) => NodeType::HttpRequest,
            Self::Integration(_) => NodeType::Integration,
            Self::AiGenerate(_) => NodeType::AiGenerate,
            Self::SetVariables(_) => NodeType::SetVariables,
            Self::Delay(_) => NodeType::Delay,
            Self::Log(_) => NodeType::Log,
            Self::Condition(_) => NodeType::Condition,
            Self::Unknown => NodeType::Unknown,
        }
    }
}

/// Per-node execution policy.
///
/// Unset timeouts and delays fall back to the engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    /// Extra attempts after the first one.
    #[serde(default)]
    pub retries: u32,
    /// Fixed delay between attempts.
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,
    /// Wall-clock limit for a single attempt.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Keep walking the graph after this node exhausts its attempts.
    #[serde(default)]
    pub continue_on_error: bool,
    /// Advisory hint for handlers; the walker always runs sequentially.
    #[serde(default)]
    pub parallel: bool,
}

/// A workflow node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    /// Human-readable name for this node.
    pub name: String,
    pub config: NodeConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionConfig>,
    /// Run this node whenever another node fails terminally.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error_handler: bool,
}

impl Node {
    /// Creates a node with the default execution policy.
    #[must_use]
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            config,
            execution: None,
            error_handler: false,
        }
    }

    /// Sets the execution policy.
    #[must_use]
    pub fn with_execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = Some(execution);
        self
    }

    /// Flags this node as an error handler.
    #[must_use]
    pub fn as_error_handler(mut self) -> Self {
        self.error_handler = true;
        self
    }

    /// Returns the type tag of this node.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.config.node_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_tagged_config() {
        let node: Node = serde_json::from_value(json!({
            "id": "notify",
            "name": "Notify ops",
            "config": {
                "type": "http_request",
                "method": "POST",
                "url": "https://example.test/hooks/{{input.team}}",
                "body": {"text": "{{summary}}"}
            },
            "execution": {"retries": 2, "continueOnError": true}
        }))
        .expect("deserialize");

        assert_eq!(node.node_type(), NodeType::HttpRequest);
        let NodeConfig::HttpRequest(http) = &node.config else {
            panic!("expected http_request config");
        };
        assert_eq!(http.method, HttpMethod::Post);
        assert!(http.headers.is_empty());

        let exec = node.execution.expect("execution config");
        assert_eq!(exec.retries, 2);
        assert!(exec.continue_on_error);
        assert_eq!(exec.timeout_ms, None);
    }

    #[test]
    fn unrecognised_type_becomes_unknown() {
        let node: Node = serde_json::from_value(json!({
            "id": "fax",
            "name": "Send fax",
            "config": {"type": "fax_machine", "number": "555-0100"}
        }))
        .expect("deserialize");

        assert_eq!(node.node_type(), NodeType::Unknown);
    }

    #[test]
    fn unit_trigger_config() {
        let node: Node = serde_json::from_value(json!({
            "id": "start",
            "name": "Start",
            "config": {"type": "manual"}
        }))
        .expect("deserialize");

        assert!(node.node_type().is_trigger());
        assert!(!node.error_handler);
    }

    #[test]
    fn error_handler_flag_round_trips() {
        let node = Node::new(
            "alert",
            "Alert",
            NodeConfig::Log(LogConfig {
                level: LogLevel::Error,
                message: "{{$error.message}}".to_string(),
            }),
        )
        .as_error_handler();

        let json = serde_json::to_value(&node).expect("serialize");
        assert_eq!(json["errorHandler"], json!(true));
        assert_eq!(json["config"]["type"], json!("log"));
        assert!(json.get("execution").is_none());
    }

    #[test]
    fn node_type_tags_match_serde() {
        for ty in [NodeType::HttpRequest, NodeType::AiGenerate, NodeType::SetVariables] {
            let json = serde_json::to_value(ty).expect("serialize");
            assert_eq!(json, json!(ty.as_str()));
        }
    }
}
