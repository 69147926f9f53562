pub mod chat;
pub mod prompts;

use crate::config::{read_env_non_empty, GeneratorConfig};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

pub use chat::ChatCompletionsGenerator;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("text generation is not configured: {0}")]
    NotConfigured(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid generator response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub system_role: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// External text generation: prompt in, text out. One attempt per call.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    fn name(&self) -> &str;
}

/// Stands in when no API key is available; every call fails.
#[derive(Debug, Clone)]
pub struct UnconfiguredGenerator {
    reason: String,
}

impl UnconfiguredGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl TextGenerator for UnconfiguredGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        Err(GenerationError::NotConfigured(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

/// Builds the chat-completions generator, or an [`UnconfiguredGenerator`]
/// when the key variable is unset so the rest of the service still starts.
pub fn load_generator(config: &GeneratorConfig) -> Arc<dyn TextGenerator> {
    match read_env_non_empty(&config.api_key_env) {
        Some(api_key) => {
            let generator = ChatCompletionsGenerator::new(config, api_key);
            tracing::info!(
                model = generator.model_name(),
                endpoint = %config.endpoint,
                "chat-completions generator configured"
            );
            Arc::new(generator)
        }
        None => {
            tracing::warn!(
                api_key_env = %config.api_key_env,
                "no generator api key set; advisory endpoints will fail"
            );
            Arc::new(UnconfiguredGenerator::new(format!(
                "missing API key in {}",
                config.api_key_env
            )))
        }
    }
}
