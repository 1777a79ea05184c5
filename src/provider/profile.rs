//! Provider configuration profile.

use crate::error::ReportError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    None,
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
    Ollama,
    LocalCustom,
}

/// Sampling options sent with every request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_type")]
    pub provider_type: ProviderType,

    #[serde(default)]
    pub model: String,

    /// Base URL for OpenAI-compatible endpoints (e.g. http://localhost:8080/v1)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Name of the environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider_type() -> ProviderType {
    ProviderType::None
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    1200
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            model: String::new(),
            endpoint: None,
            api_key_env: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.provider_type != ProviderType::None && self.model.trim().is_empty() {
            return Err("Provider model cannot be empty".to_string());
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(format!("Invalid provider endpoint '{}'", endpoint));
            }
        }
        if self.provider_type == ProviderType::LocalCustom && self.endpoint.is_none() {
            return Err("local_custom provider requires an endpoint".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "Temperature {} outside 0.0-2.0",
                self.temperature
            ));
        }
        Ok(())
    }

    /// Read the API key from the configured environment variable, if any.
    pub fn resolve_api_key(&self) -> Result<Option<String>, ReportError> {
        let Some(var) = &self.api_key_env else {
            return Ok(None);
        };
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(key)),
            _ => Err(ReportError::ProviderNotConfigured(format!(
                "Environment variable {} is not set",
                var
            ))),
        }
    }

    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        }
    }
}
