use super::wrong_config;
use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use switchyard_ai::{FailoverChain, GenerationRequest};
use switchyard_workflow::expression::render;
use switchyard_workflow::{ExecutionContext, Node, NodeConfig, NodeError, NodeHandler, NodeType};
use tracing::{debug, instrument};

const SERVICE: &str = "ai";

/// Generates text through the failover chain.
#[derive(Debug, Clone)]
pub struct AiGenerateHandler {
    chain: Arc<FailoverChain>,
}

impl AiGenerateHandler {
    #[must_use]
    pub fn new(chain: Arc<FailoverChain>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl NodeHandler for AiGenerateHandler {
    #[instrument(skip(self, node, context), fields(node_id = %node.id))]
    async fn execute(&self, node: &Node, context: &ExecutionContext) -> Result<JsonValue, NodeError> {
        let NodeConfig::AiGenerate(config) = &node.config else {
            return Err(wrong_config(node, NodeType::AiGenerate));
        };
        let prompt = render(&config.prompt, context);
        if prompt.trim().is_empty() {
            return Err(NodeError::MissingConfig {
                field: "prompt".to_string(),
            });
        }

        let mut request = GenerationRequest::new(prompt);
        if let Some(system) = &config.system {
            request = request.with_system(render(system, context));
        }
        if let Some(model) = &config.model {
            request = request.with_model(model);
        }
        if let Some(max_tokens) = config.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = config.temperature {
            request = request.with_temperature(temperature);
        }

        let response = self
            .chain
            .generate(&request)
            .await
            .map_err(|e| NodeError::External {
                service: SERVICE.to_string(),
                message: e.to_string(),
            })?;
        debug!(
            backend = %response.backend,
            tokens = response.usage.total(),
            "Generation completed"
        );

        Ok(json!({
            "text": response.text,
            "model": response.model,
            "backend": response.backend,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use switchyard_ai::{GenerationBackend, GenerationError, GenerationResponse};
    use switchyard_workflow::node::AiGenerateConfig;

    /// Echoes the prompt back and remembers the last request.
    #[derive(Default)]
    struct Echo {
        last: Mutex<Option<GenerationRequest>>,
    }

    #[async_trait]
    impl GenerationBackend for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-1"
        }

        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<GenerationResponse, GenerationError> {
            *self.last.lock().unwrap() = Some(request.clone());
            Ok(GenerationResponse {
                text: format!("echo: {}", request.prompt),
                model: "echo-1".to_string(),
                backend: "echo".to_string(),
                usage: Default::default(),
            })
        }
    }

    fn node(prompt: &str) -> Node {
        Node::new(
            "draft",
            "Draft reply",
            NodeConfig::AiGenerate(AiGenerateConfig {
                prompt: prompt.to_string(),
                system: Some("Reply as {{input.brand}}".to_string()),
                model: None,
                max_tokens: Some(100),
                temperature: None,
            }),
        )
    }

    #[tokio::test]
    async fn renders_prompt_and_returns_text() {
        let echo = Arc::new(Echo::default());
        let handler = AiGenerateHandler::new(Arc::new(FailoverChain::new(vec![
            echo.clone() as Arc<dyn GenerationBackend>
        ])));
        let context = ExecutionContext::new(json!({"brand": "Acme", "question": "Where is my parcel?"}));

        let output = handler
            .execute(&node("Answer: {{input.question}}"), &context)
            .await
            .expect("run");

        assert_eq!(
            output,
            json!({"text": "echo: Answer: Where is my parcel?", "model": "echo-1", "backend": "echo"})
        );
        let last = echo.last.lock().unwrap().clone().expect("request recorded");
        assert_eq!(last.system.as_deref(), Some("Reply as Acme"));
        assert_eq!(last.max_tokens, Some(100));
    }

    #[tokio::test]
    async fn empty_prompt_is_missing_config() {
        let handler = AiGenerateHandler::new(Arc::new(FailoverChain::new(Vec::new())));
        let err = handler
            .execute(&node("{{input.missing}}"), &ExecutionContext::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            NodeError::MissingConfig {
                field: "prompt".to_string()
            }
        );
    }

    #[tokio::test]
    async fn unconfigured_chain_is_external_error() {
        let handler = AiGenerateHandler::new(Arc::new(FailoverChain::new(Vec::new())));
        let err = handler
            .execute(&node("Say hi"), &ExecutionContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::External { ref service, .. } if service == "ai"));
    }
}
