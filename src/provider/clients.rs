//! HTTP provider clients.

use crate::error::ReportError;
use crate::provider::profile::CompletionOptions;
use crate::provider::TextGenerator;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROVIDER_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const SYSTEM_PROMPT: &str = "You are a competitive research analyst. Write concise, factual \
comparison notes in Markdown. Only use the facts provided.";

fn build_provider_http_client() -> Result<Client, ReportError> {
    Client::builder()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(PROVIDER_HTTP_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| {
            ReportError::ProviderNotConfigured(format!("Failed to create HTTP client: {}", e))
        })
}

// Map transport errors to the retry taxonomy
fn map_http_error(error: reqwest::Error) -> ReportError {
    if let Some(status) = error.status() {
        status_error(status.as_u16(), &error.to_string())
    } else if error.is_timeout() {
        ReportError::ProviderRequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        ReportError::ProviderRequestFailed(format!("Connection error: {}", error))
    } else {
        ReportError::TransientGeneration(format!("HTTP error: {}", error))
    }
}

fn status_error(status: u16, body: &str) -> ReportError {
    match status {
        401 | 403 => ReportError::ProviderAuthFailed(format!("Authentication failed: {}", body)),
        429 => ReportError::ProviderRateLimit(format!("Rate limit exceeded: {}", body)),
        404 => ReportError::ProviderNotConfigured(format!("Model or endpoint not found: {}", body)),
        _ => ReportError::ProviderRequestFailed(format!(
            "Request failed with status {}: {}",
            status, body
        )),
    }
}

async fn error_from_response(response: reqwest::Response) -> ReportError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    status_error(status, &body)
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints (OpenAI, Ollama, local servers)
pub struct OpenAiCompatibleGenerator {
    client: Client,
    provider: &'static str,
    model: String,
    api_key: Option<String>,
    base_url: String,
    options: CompletionOptions,
}

impl OpenAiCompatibleGenerator {
    pub fn new(
        provider: &'static str,
        model: String,
        api_key: Option<String>,
        base_url: Option<String>,
        options: CompletionOptions,
    ) -> Result<Self, ReportError> {
        Ok(Self {
            client: build_provider_http_client()?,
            provider,
            model,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            options,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatibleGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ReportError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }
        let response = builder.send().await.map_err(map_http_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            ReportError::TransientGeneration(format!("Failed to parse response: {}", e))
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ReportError::TransientGeneration("Empty completion".to_string()))
    }

    fn name(&self) -> &str {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Anthropic messages API client
pub struct AnthropicGenerator {
    client: Client,
    model: String,
    api_key: String,
    options: CompletionOptions,
}

impl AnthropicGenerator {
    pub fn new(
        model: String,
        api_key: String,
        options: CompletionOptions,
    ) -> Result<Self, ReportError> {
        Ok(Self {
            client: build_provider_http_client()?,
            model,
            api_key,
            options,
        })
    }
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ReportError> {
        let mut request_body = json!({
            "model": self.model,
            "max_tokens": self.options.max_tokens.unwrap_or(1024),
            "system": SYSTEM_PROMPT,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(temp) = self.options.temperature {
            request_body["temperature"] = json!(temp);
        }

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Vec<AnthropicContent>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            #[serde(default)]
            text: String,
        }

        let completion: AnthropicResponse = response.json().await.map_err(|e| {
            ReportError::TransientGeneration(format!("Failed to parse response: {}", e))
        })?;

        let text: String = completion
            .content
            .into_iter()
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(ReportError::TransientGeneration("Empty completion".to_string()));
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Generator used when no provider is configured.
#[derive(Debug, Default)]
pub struct DisabledGenerator;

impl DisabledGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextGenerator for DisabledGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, ReportError> {
        Err(ReportError::ProviderNotConfigured(
            "no text generation provider configured".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "disabled"
    }

    fn model(&self) -> &str {
        "none"
    }
}
