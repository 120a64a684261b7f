//! Incoming-webhook chat connector (Slack, Mattermost, Discord-compatible).

use crate::connector::{
    Connector, ConnectorCapability, ConnectorInfo, Operation, OperationInfo, OperationMetadata,
    OperationResult,
};
use crate::error::ConnectorError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

const SEND_MESSAGE: &str = "send_message";
const WEBHOOK_URL: &str = "webhook_url";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Posts `{"text": ...}` to the webhook URL given in the credentials.
#[derive(Debug, Clone, Default)]
pub struct ChatWebhookConnector {
    http: Client,
}

impl ChatWebhookConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn text(operation: &Operation) -> Result<&str, ConnectorError> {
        operation
            .param_str("text")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConnectorError::InvalidParameters {
                operation: operation.name.clone(),
                reason: "text is required".to_string(),
            })
    }
}

/// Maps rejected credentials and throttling to connector errors. Other
/// non-2xx responses are reported as failed operations.
fn rejection(status: StatusCode, retry_after_secs: Option<u64>) -> Option<ConnectorError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Some(ConnectorError::AuthenticationFailed {
                reason: format!("webhook returned HTTP {}", status.as_u16()),
            })
        }
        StatusCode::TOO_MANY_REQUESTS => Some(ConnectorError::RateLimited { retry_after_secs }),
        _ => None,
    }
}

#[async_trait]
impl Connector for ChatWebhookConnector {
    fn info(&self) -> ConnectorInfo {
        ConnectorInfo {
            id: "chat_webhook".to_string(),
            name: "Chat webhook".to_string(),
            description: "Sends messages to a chat channel's incoming webhook".to_string(),
            operations: vec![OperationInfo {
                name: SEND_MESSAGE.to_string(),
                description: "Post a text message".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {"text": {"type": "string"}},
                    "required": ["text"]
                }),
            }],
            capabilities: vec![ConnectorCapability::Write, ConnectorCapability::Credentials],
        }
    }

    #[instrument(skip(self, operation), fields(operation = %operation.name))]
    async fn execute(&self, operation: Operation) -> Result<OperationResult, ConnectorError> {
        if operation.name != SEND_MESSAGE {
            return Err(ConnectorError::OperationNotSupported {
                operation: operation.name,
            });
        }
        let text = Self::text(&operation)?;
        let url = operation.credential(WEBHOOK_URL)?;

        let started = Instant::now();
        let response = self
            .http
            .post(url)
            .timeout(REQUEST_TIMEOUT)
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ConnectorError::Timeout
                } else {
                    ConnectorError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                }
            })?;
        let metadata = OperationMetadata {
            latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            api_calls: 1,
        };

        let status = response.status();
        debug!(status = status.as_u16(), "Webhook responded");
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        if let Some(e) = rejection(status, retry_after_secs) {
            return Err(e);
        }
        if status.is_success() {
            Ok(OperationResult::success(
                json!({ "delivered": true, "status": status.as_u16() }),
                metadata,
            ))
        } else {
            let body = response.text().await.unwrap_or_default();
            Ok(OperationResult::failure(
                format!("webhook returned HTTP {}: {body}", status.as_u16()),
                metadata,
            ))
        }
    }

    async fn health_check(&self) -> Result<bool, ConnectorError> {
        // The target URL only arrives with an operation's credentials.
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn rejects_unknown_operation() {
        let err = ChatWebhookConnector::new()
            .execute(Operation::new("delete_channel"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ConnectorError::OperationNotSupported {
                operation: "delete_channel".to_string()
            }
        );
    }

    #[tokio::test]
    async fn requires_text_before_credentials() {
        let err = ChatWebhookConnector::new()
            .execute(Operation::new(SEND_MESSAGE))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidParameters { .. }));
    }

    #[test]
    fn auth_and_throttling_responses_are_errors() {
        assert_eq!(
            rejection(StatusCode::UNAUTHORIZED, None),
            Some(ConnectorError::AuthenticationFailed {
                reason: "webhook returned HTTP 401".to_string()
            })
        );
        assert!(matches!(
            rejection(StatusCode::FORBIDDEN, None),
            Some(ConnectorError::AuthenticationFailed { .. })
        ));
        assert_eq!(
            rejection(StatusCode::TOO_MANY_REQUESTS, Some(30)),
            Some(ConnectorError::RateLimited {
                retry_after_secs: Some(30)
            })
        );
        assert_eq!(rejection(StatusCode::INTERNAL_SERVER_ERROR, None), None);
        assert_eq!(rejection(StatusCode::OK, None), None);
    }

    #[tokio::test]
    async fn requires_webhook_url() {
        let op = Operation::new(SEND_MESSAGE)
            .with_param("text", json!("Deploy finished"))
            .with_credentials(BTreeMap::new());
        let err = ChatWebhookConnector::new().execute(op).await.unwrap_err();
        assert_eq!(
            err,
            ConnectorError::MissingCredential {
                name: WEBHOOK_URL.to_string()
            }
        );
    }
}
