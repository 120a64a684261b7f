//! Ordered failover across generation backends.
//!
//! Each backend is tried up to `attempts_per_backend` times with
//! exponential backoff on retryable errors. A non-retryable error, or
//! running out of attempts, moves on to the next backend.

use crate::backend::{BackendConfig, GenerationBackend, GenerationRequest, GenerationResponse};
use crate::error::GenerationError;
use crate::openai::OpenAiCompatibleBackend;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Failover settings plus the backends to try, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    #[serde(default = "default_attempts_per_backend")]
    pub attempts_per_backend: u32,

    /// Backoff before the second attempt; doubles after each retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_attempts_per_backend() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            backends: Vec::new(),
            attempts_per_backend: default_attempts_per_backend(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Tries backends in order until one answers.
#[derive(Clone)]
pub struct FailoverChain {
    backends: Vec<Arc<dyn GenerationBackend>>,
    attempts_per_backend: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl FailoverChain {
    /// Creates a chain over the given backends with default settings.
    #[must_use]
    pub fn new(backends: Vec<Arc<dyn GenerationBackend>>) -> Self {
        let defaults = AiConfig::default();
        Self {
            backends,
            attempts_per_backend: defaults.attempts_per_backend,
            initial_backoff: Duration::from_millis(defaults.initial_backoff_ms),
            max_backoff: Duration::from_millis(defaults.max_backoff_ms),
        }
    }

    /// Builds an OpenAI-compatible backend for every configured entry.
    #[must_use]
    pub fn from_config(config: &AiConfig) -> Self {
        let backends = config
            .backends
            .iter()
            .cloned()
            .map(|b| Arc::new(OpenAiCompatibleBackend::new(b)) as Arc<dyn GenerationBackend>)
            .collect();
        Self::new(backends)
            .with_attempts_per_backend(config.attempts_per_backend)
            .with_backoff(
                Duration::from_millis(config.initial_backoff_ms),
                Duration::from_millis(config.max_backoff_ms),
            )
    }

    /// Sets how many times each backend is tried. Zero is treated as one.
    #[must_use]
    pub fn with_attempts_per_backend(mut self, attempts: u32) -> Self {
        self.attempts_per_backend = attempts.max(1);
        self
    }

    /// Sets the initial and maximum backoff.
    #[must_use]
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Returns whether any backend is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Generates a completion from the first backend that succeeds.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::NotConfigured` for an empty chain and
    /// `GenerationError::Exhausted` when every backend failed.
    #[instrument(skip(self, request), fields(backends = self.backends.len()))]
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        if self.backends.is_empty() {
            return Err(GenerationError::NotConfigured);
        }

        let mut total_attempts = 0;
        let mut last_error = None;
        for (position, backend) in self.backends.iter().enumerate() {
            for attempt in 0..self.attempts_per_backend {
                total_attempts += 1;
                match backend.generate(request).await {
                    Ok(response) => {
                        if position > 0 {
                            info!(backend = backend.name(), "Fell back to alternative backend");
                        }
                        return Ok(response);
                    }
                    Err(e) => {
                        let retry = e.is_retryable() && attempt + 1 < self.attempts_per_backend;
                        if retry {
                            let backoff = self.backoff(attempt);
                            warn!(
                                backend = backend.name(),
                                attempt = attempt + 1,
                                backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                                error = %e,
                                "Retrying generation request"
                            );
                            last_error = Some(e);
                            tokio::time::sleep(backoff).await;
                            continue;
                        }
                        warn!(backend = backend.name(), error = %e, "Generation backend failed");
                        last_error = Some(e);
                        break;
                    }
                }
            }
        }

        Err(GenerationError::Exhausted {
            attempts: total_attempts,
            last_error: last_error.map_or_else(String::new, |e| e.to_string()),
        })
    }
}

impl std::fmt::Debug for FailoverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.backends.iter().map(|b| b.name()).collect();
        f.debug_struct("FailoverChain")
            .field("backends", &names)
            .field("attempts_per_backend", &self.attempts_per_backend)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted results, then keeps failing.
    struct Scripted {
        name: String,
        results: Mutex<VecDeque<Result<String, GenerationError>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(name: &str, results: Vec<Result<String, GenerationError>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                results: Mutex::new(results.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl GenerationBackend for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        fn model(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> Result<GenerationResponse, GenerationError> {
            *self.calls.lock().unwrap() += 1;
            let next = self.results.lock().unwrap().pop_front();
            match next {
                Some(Ok(text)) => Ok(GenerationResponse {
                    text,
                    model: "scripted".to_string(),
                    backend: self.name.clone(),
                    usage: Default::default(),
                }),
                Some(Err(e)) => Err(e),
                None => Err(GenerationError::RequestFailed {
                    backend: self.name.clone(),
                    reason: "script exhausted".to_string(),
                }),
            }
        }
    }

    fn busy(backend: &str) -> GenerationError {
        GenerationError::RateLimited {
            backend: backend.to_string(),
            retry_after_secs: None,
        }
    }

    fn chain(backends: Vec<Arc<dyn GenerationBackend>>) -> FailoverChain {
        FailoverChain::new(backends)
            .with_attempts_per_backend(3)
            .with_backoff(Duration::from_millis(1), Duration::from_millis(4))
    }

    #[tokio::test]
    async fn retries_same_backend_on_retryable_error() {
        let primary = Scripted::new("primary", vec![Err(busy("primary")), Ok("hello".into())]);
        let chain = chain(vec![primary.clone() as Arc<dyn GenerationBackend>]);

        let response = chain
            .generate(&GenerationRequest::new("hi"))
            .await
            .expect("second attempt succeeds");

        assert_eq!(response.text, "hello");
        assert_eq!(primary.calls(), 2);
    }

    #[tokio::test]
    async fn non_retryable_error_moves_to_next_backend() {
        let primary = Scripted::new(
            "primary",
            vec![Err(GenerationError::Status {
                backend: "primary".into(),
                status: 401,
                body: "bad key".into(),
            })],
        );
        let secondary = Scripted::new("secondary", vec![Ok("from secondary".into())]);
        let chain = chain(vec![
            primary.clone() as Arc<dyn GenerationBackend>,
            secondary.clone(),
        ]);

        let response = chain
            .generate(&GenerationRequest::new("hi"))
            .await
            .expect("secondary answers");

        assert_eq!(response.backend, "secondary");
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn exhaustion_reports_attempts_and_last_error() {
        let primary = Scripted::new("primary", Vec::new());
        let secondary = Scripted::new("secondary", Vec::new());
        let chain = chain(vec![primary as Arc<dyn GenerationBackend>, secondary]);

        let err = chain
            .generate(&GenerationRequest::new("hi"))
            .await
            .unwrap_err();

        match err {
            GenerationError::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 6);
                assert!(last_error.contains("secondary"));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_chain_is_not_configured() {
        let err = FailoverChain::new(Vec::new())
            .generate(&GenerationRequest::new("hi"))
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::NotConfigured);
    }

    #[test]
    fn backoff_doubles_up_to_max() {
        let chain = chain(Vec::new());
        assert_eq!(chain.backoff(0), Duration::from_millis(1));
        assert_eq!(chain.backoff(1), Duration::from_millis(2));
        assert_eq!(chain.backoff(5), Duration::from_millis(4));
    }

    #[test]
    fn config_defaults() {
        let config: AiConfig = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(config, AiConfig::default());
        assert_eq!(config.attempts_per_backend, 2);
        assert!(FailoverChain::from_config(&config).is_empty());
    }
}
