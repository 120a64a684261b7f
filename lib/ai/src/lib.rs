//! AI text generation for switchyard workflows.
//!
//! - [`GenerationBackend`]: one provider endpoint
//! - [`OpenAiCompatibleBackend`]: any server speaking the chat completions API
//! - [`FailoverChain`]: ordered backends with retry and fallback

pub mod backend;
pub mod error;
pub mod failover;
pub mod openai;

pub use backend::{
    BackendConfig, GenerationBackend, GenerationRequest, GenerationResponse, TokenUsage,
};
pub use error::GenerationError;
pub use failover::{AiConfig, FailoverChain};
pub use openai::OpenAiCompatibleBackend;
