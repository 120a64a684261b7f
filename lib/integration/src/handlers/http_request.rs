use super::wrong_config;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{Map, Value as JsonValue, json};
use std::time::Duration;
use switchyard_workflow::expression::{render, resolve_value};
use switchyard_workflow::node::{HttpMethod, HttpRequestConfig};
use switchyard_workflow::{ExecutionContext, Node, NodeConfig, NodeError, NodeHandler, NodeType};
use tracing::{debug, instrument};

const SERVICE: &str = "http";

/// Performs an outbound HTTP request.
///
/// Output is `{status, headers, body}`; a JSON response body is parsed,
/// anything else is returned as text. Non-2xx responses fail the node.
#[derive(Debug, Clone, Default)]
pub struct HttpRequestHandler {
    http: Client,
}

/// A request with every template resolved.
#[derive(Debug, Clone, PartialEq)]
struct PreparedRequest {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Option<JsonValue>,
    timeout: Option<Duration>,
}

impl HttpRequestHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn prepare(
        config: &HttpRequestConfig,
        context: &ExecutionContext,
    ) -> Result<PreparedRequest, NodeError> {
        let url = render(&config.url, context);
        if url.trim().is_empty() {
            return Err(NodeError::MissingConfig {
                field: "url".to_string(),
            });
        }

        let render_pairs = |pairs: &std::collections::BTreeMap<String, String>| {
            pairs
                .iter()
                .map(|(k, v)| (k.clone(), render(v, context)))
                .collect::<Vec<_>>()
        };

        Ok(PreparedRequest {
            method: method(config.method),
            url,
            headers: render_pairs(&config.headers),
            query: render_pairs(&config.query),
            body: config.body.as_ref().map(|b| resolve_value(b, context)),
            timeout: config.timeout_ms.map(Duration::from_millis),
        })
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
    }
}

fn parse_body(raw: String) -> JsonValue {
    if raw.is_empty() {
        return JsonValue::Null;
    }
    serde_json::from_str(&raw).unwrap_or(JsonValue::String(raw))
}

#[async_trait]
impl NodeHandler for HttpRequestHandler {
    #[instrument(skip(self, node, context), fields(node_id = %node.id))]
    async fn execute(&self, node: &Node, context: &ExecutionContext) -> Result<JsonValue, NodeError> {
        let NodeConfig::HttpRequest(config) = &node.config else {
            return Err(wrong_config(node, NodeType::HttpRequest));
        };
        let prepared = Self::prepare(config, context)?;

        let mut request = self
            .http
            .request(prepared.method.clone(), &prepared.url)
            .query(&prepared.query);
        for (name, value) in &prepared.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &prepared.body {
            request = request.json(body);
        }
        if let Some(timeout) = prepared.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout()
                && let Some(timeout) = prepared.timeout
            {
                NodeError::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }
            } else {
                NodeError::External {
                    service: SERVICE.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let headers: Map<String, JsonValue> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), JsonValue::String(v.to_string())))
            })
            .collect();
        let raw = response.text().await.map_err(|e| NodeError::External {
            service: SERVICE.to_string(),
            message: e.to_string(),
        })?;
        debug!(status = status.as_u16(), bytes = raw.len(), "HTTP response received");

        if !status.is_success() {
            return Err(NodeError::External {
                service: SERVICE.to_string(),
                message: format!(
                    "{} {} returned HTTP {}",
                    prepared.method,
                    prepared.url,
                    status.as_u16()
                ),
            });
        }

        Ok(json!({
            "status": status.as_u16(),
            "headers": headers,
            "body": parse_body(raw),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn config() -> HttpRequestConfig {
        HttpRequestConfig {
            method: HttpMethod::Post,
            url: "https://api.example.test/orders/{{input.orderId}}/notify".to_string(),
            headers: BTreeMap::from([(
                "Authorization".to_string(),
                "Bearer {{token}}".to_string(),
            )]),
            query: BTreeMap::from([("channel".to_string(), "{{input.channel}}".to_string())]),
            body: Some(json!({"orderId": "{{input.orderId}}", "note": "fixed"})),
            timeout_ms: Some(2_000),
        }
    }

    #[test]
    fn prepare_resolves_templates() {
        let mut context = ExecutionContext::new(json!({"orderId": 7, "channel": "sms"}));
        context.set_result("token", json!("t0k"));

        let prepared = HttpRequestHandler::prepare(&config(), &context).expect("prepare");

        assert_eq!(prepared.method, Method::POST);
        assert_eq!(prepared.url, "https://api.example.test/orders/7/notify");
        assert_eq!(
            prepared.headers,
            vec![("Authorization".to_string(), "Bearer t0k".to_string())]
        );
        assert_eq!(
            prepared.query,
            vec![("channel".to_string(), "sms".to_string())]
        );
        assert_eq!(prepared.body, Some(json!({"orderId": 7, "note": "fixed"})));
        assert_eq!(prepared.timeout, Some(Duration::from_millis(2_000)));
    }

    #[test]
    fn empty_url_is_missing_config() {
        let mut config = config();
        config.url = "{{input.callbackUrl}}".to_string();

        let err = HttpRequestHandler::prepare(&config, &ExecutionContext::default()).unwrap_err();
        assert_eq!(
            err,
            NodeError::MissingConfig {
                field: "url".to_string()
            }
        );
    }

    #[test]
    fn body_parsing() {
        assert_eq!(parse_body(r#"{"ok":true}"#.to_string()), json!({"ok": true}));
        assert_eq!(parse_body("plain text".to_string()), json!("plain text"));
        assert_eq!(parse_body(String::new()), JsonValue::Null);
    }
}
