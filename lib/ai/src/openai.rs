//! OpenAI-compatible chat completions backend.
//!
//! Works with any server exposing `POST {base_url}/chat/completions`
//! (OpenAI, Ollama, vLLM, Groq, OpenRouter, ...).

use crate::backend::{
    BackendConfig, GenerationBackend, GenerationRequest, GenerationResponse, TokenUsage,
};
use crate::error::GenerationError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Client for one OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleBackend {
    http: Client,
    config: BackendConfig,
}

impl OpenAiCompatibleBackend {
    /// Creates a backend from its configuration.
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn body<'a>(&'a self, request: &'a GenerationRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        ChatRequest {
            model: request.model.as_deref().unwrap_or(&self.config.model),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }

    fn parse(&self, raw: &str, requested_model: &str) -> Result<GenerationResponse, GenerationError> {
        let response: ChatResponse =
            serde_json::from_str(raw).map_err(|e| GenerationError::InvalidResponse {
                backend: self.config.name.clone(),
                reason: e.to_string(),
            })?;

        let Some(text) = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
        else {
            return Err(GenerationError::InvalidResponse {
                backend: self.config.name.clone(),
                reason: "response contained no message content".to_string(),
            });
        };

        let usage = response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(GenerationResponse {
            text,
            model: response
                .model
                .unwrap_or_else(|| requested_model.to_string()),
            backend: self.config.name.clone(),
            usage,
        })
    }

    fn transport_error(&self, e: &reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout {
                backend: self.config.name.clone(),
            }
        } else {
            GenerationError::RequestFailed {
                backend: self.config.name.clone(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl GenerationBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, request), fields(backend = %self.config.name))]
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let body = self.body(request);
        let model = body.model.to_string();

        let mut call = self
            .http
            .post(self.endpoint())
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .json(&body);
        if let Some(key) = &self.config.api_key {
            call = call.bearer_auth(key);
        }

        let response = call.send().await.map_err(|e| self.transport_error(&e))?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(GenerationError::RateLimited {
                backend: self.config.name.clone(),
                retry_after_secs,
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|e| self.transport_error(&e))?;
        if !status.is_success() {
            return Err(GenerationError::Status {
                backend: self.config.name.clone(),
                status: status.as_u16(),
                body: raw,
            });
        }

        debug!(status = status.as_u16(), "Generation response received");
        self.parse(&raw, &model)
    }
}
