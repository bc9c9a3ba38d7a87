//! Chat-completions client for OpenAI-compatible providers.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::ProviderConfig;

use super::{ChatMessage, ChatOptions, LlmResponse, ToolCall, Usage};

#[derive(Debug, Error)]
pub enum LlmError {
    /// The provider answered with a non-success status; the remote error
    /// payload is attached when the body was readable.
    #[error("Failed to get LLM response: {message}")]
    Api {
        message: String,
        payload: Option<Value>,
    },

    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM provider returned no choices")]
    EmptyResponse,
}

/// The seam the planning loop talks through. Implemented by the real HTTP
/// client and by scripted doubles in tests.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<LlmResponse, LlmError>;

    /// Model used when a request does not name one.
    fn default_model(&self) -> &str;
}

/// HTTP client for any provider speaking the OpenAI chat-completions dialect
/// (OpenRouter, SambaNova).
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    provider: ProviderConfig,
}

impl OpenAiCompatClient {
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            provider,
        }
    }

    /// Use an explicit HTTP client (shared connection pool, test doubles).
    pub fn with_client(http: reqwest::Client, provider: ProviderConfig) -> Self {
        Self { http, provider }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider.name
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<LlmResponse, LlmError> {
        let model = options
            .model
            .as_deref()
            .unwrap_or(&self.provider.default_model);

        let mut body = json!({
            "model": model,
            "messages": messages,
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
            "top_p": options.top_p,
            "frequency_penalty": options.frequency_penalty,
            "presence_penalty": options.presence_penalty,
        });
        if let Some(stop) = &options.stop {
            body["stop"] = json!(stop);
        }

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.provider.base_url))
            .bearer_auth(&self.provider.api_key)
            .json(&body);

        // OpenRouter attributes traffic by referer.
        if self.provider.name == "OpenRouter" {
            request = request
                .header("HTTP-Referer", "http://localhost:3000")
                .header("X-Title", "Agent Platform");
        }

        tracing::debug!(model, messages = messages.len(), "sending chat completion");

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let payload: Option<Value> = response.json().await.ok();
            let message = payload
                .as_ref()
                .and_then(|p| p["error"]["message"].as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(LlmError::Api { message, payload });
        }

        let completion: ChatCompletion = response.json().await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse)?;

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls: choice.message.tool_calls,
            finish_reason: choice.finish_reason,
            usage: completion.usage.unwrap_or_default(),
        })
    }

    fn default_model(&self) -> &str {
        &self.provider.default_model
    }
}

// Wire shape of the provider response; only the fields we read.

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}
