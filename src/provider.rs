//! Text Generation Providers
//!
//! The report builder treats text generation as an unreliable prompt-in,
//! text-out service. This module defines that contract and the HTTP clients
//! that satisfy it (OpenAI-compatible chat completions and Anthropic
//! messages). All size and rate discipline lives with the caller.

use crate::error::ReportError;
use async_trait::async_trait;
use std::sync::Arc;

pub mod clients;
pub mod profile;

pub use clients::{AnthropicGenerator, DisabledGenerator, OpenAiCompatibleGenerator};
pub use profile::{ProviderConfig, ProviderType};

/// Text generation collaborator
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce text for a bounded-size prompt.
    async fn generate(&self, prompt: &str) -> Result<String, ReportError>;

    /// Provider name used in logs
    fn name(&self) -> &str;

    fn model(&self) -> &str;
}

/// Build a generator from configuration.
///
/// `ProviderType::None` yields a generator that always declines, so every
/// section falls back to templated content.
pub fn create_generator(config: &ProviderConfig) -> Result<Arc<dyn TextGenerator>, ReportError> {
    config.validate().map_err(ReportError::Config)?;
    let generator: Arc<dyn TextGenerator> = match config.provider_type {
        ProviderType::None => Arc::new(DisabledGenerator::new()),
        ProviderType::OpenAI => Arc::new(OpenAiCompatibleGenerator::new(
            "openai",
            config.model.clone(),
            config.resolve_api_key()?,
            config.endpoint.clone(),
            config.completion_options(),
        )?),
        ProviderType::Ollama => Arc::new(OpenAiCompatibleGenerator::new(
            "ollama",
            config.model.clone(),
            None,
            Some(
                config
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434/v1".to_string()),
            ),
            config.completion_options(),
        )?),
        ProviderType::LocalCustom => Arc::new(OpenAiCompatibleGenerator::new(
            "local",
            config.model.clone(),
            config.resolve_api_key().ok().flatten(),
            config.endpoint.clone(),
            config.completion_options(),
        )?),
        ProviderType::Anthropic => {
            let api_key = config.resolve_api_key()?.ok_or_else(|| {
                ReportError::ProviderNotConfigured(
                    "Anthropic provider requires an API key".to_string(),
                )
            })?;
            Arc::new(AnthropicGenerator::new(
                config.model.clone(),
                api_key,
                config.completion_options(),
            )?)
        }
    };
    Ok(generator)
}
