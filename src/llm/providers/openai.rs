// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenAI-compatible chat completions provider
//!
//! One implementation serves OpenAI, OpenRouter and Ollama, which all speak
//! the `/chat/completions` streaming protocol.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result, TetherError};
use crate::llm::message::Message;
use crate::llm::provider::{
    LlmProvider, MessageRequest, ModelInfo, ProviderEvent, ProviderStream, Usage,
};
use crate::llm::providers::common::{
    parse_numeric_token_counts, parse_retry_after_seconds, server_error, sse_blocks, sse_fields,
    transport_error,
};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const OLLAMA_API_URL: &str = "http://localhost:11434/v1/chat/completions";

/// Provider for any OpenAI-compatible chat completions endpoint
pub struct OpenAiCompatibleProvider {
    client: Client,
    name: String,
    api_key: Option<String>,
    base_url: String,
    model: String,
    extra_headers: Vec<(String, String)>,
}

impl OpenAiCompatibleProvider {
    /// Create a provider with an explicit name and endpoint
    pub fn new(
        name: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            name: name.into(),
            api_key,
            base_url: base_url.into(),
            model: model.into(),
            extra_headers: Vec::new(),
        }
    }

    /// OpenAI's hosted API
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openai", Some(api_key.into()), model, OPENAI_API_URL)
    }

    /// OpenRouter (many upstream models behind one key)
    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openrouter", Some(api_key.into()), model, OPENROUTER_API_URL)
            .with_header("X-Title", "Tether")
    }

    /// A local Ollama server; no key required
    pub fn ollama(model: impl Into<String>) -> Self {
        Self::new("ollama", None, model, OLLAMA_API_URL)
    }

    /// Override the endpoint URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Send an extra header with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    fn convert_messages(messages: &[Message], system: &str) -> Vec<ChatMessage> {
        let mut result = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            result.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        result.extend(messages.iter().map(|m| ChatMessage {
            role: m.role.to_string(),
            content: m.content.clone(),
        }));
        result
    }

    fn build_request(&self, request: &MessageRequest) -> ChatRequest {
        ChatRequest {
            model: request.model.clone(),
            messages: Self::convert_messages(&request.messages, &request.system),
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
            stream: true,
            stream_options: StreamOptions {
                include_usage: true,
            },
        }
    }

    /// Parse an error response
    fn parse_error(status: u16, body: &str, retry_after: Option<u64>) -> TetherError {
        let Ok(error_response) = serde_json::from_str::<ChatError>(body) else {
            return server_error(status, body);
        };
        let message = error_response.error.message;
        let code = error_response.error.code.as_deref().unwrap_or("");

        match (status, code) {
            (401, _) | (_, "invalid_api_key") | (_, "authentication_error") => {
                TetherError::Api(ApiError::AuthenticationFailed)
            }
            (429, _) | (_, "rate_limit_exceeded") => {
                TetherError::Api(ApiError::RateLimited(retry_after.unwrap_or(60) as u32))
            }
            (_, "context_length_exceeded") => {
                let (current, limit) = parse_numeric_token_counts(&message);
                TetherError::Api(ApiError::ContextTooLong { current, limit })
            }
            (404, _) | (_, "model_not_found") => TetherError::Api(ApiError::ModelNotFound(message)),
            _ => server_error(status, message),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        let model = |id: &str, name: &str, context: u32, output: u32, input_cost, output_cost| {
            ModelInfo {
                id: id.to_string(),
                display_name: name.to_string(),
                context_window: context,
                max_output_tokens: output,
                input_cost_per_1k: input_cost,
                output_cost_per_1k: output_cost,
            }
        };
        match self.name.as_str() {
            "openai" => vec![
                model("gpt-4o", "GPT-4o", 128_000, 16_384, 0.0025, 0.01),
                model("gpt-4o-mini", "GPT-4o mini", 128_000, 16_384, 0.00015, 0.0006),
                model("gpt-4.1", "GPT-4.1", 1_047_576, 32_768, 0.002, 0.008),
            ],
            "openrouter" => vec![
                model(
                    "anthropic/claude-sonnet-4",
                    "Claude Sonnet 4",
                    200_000,
                    64_000,
                    0.003,
                    0.015,
                ),
                model("openai/gpt-4o", "GPT-4o", 128_000, 16_384, 0.0025, 0.01),
                model(
                    "google/gemini-2.5-pro",
                    "Gemini 2.5 Pro",
                    1_048_576,
                    65_536,
                    0.00125,
                    0.01,
                ),
            ],
            // Local models are free; anything the server has pulled is usable.
            _ => vec![model(&self.model, &self.model, 32_768, 8_192, 0.0, 0.0)],
        }
    }

    async fn create_message(&self, request: MessageRequest) -> Result<ProviderStream> {
        let body = self.build_request(&request);
        tracing::debug!(
            provider = %self.name,
            model = %body.model,
            messages = body.messages.len(),
            "Sending chat completions request"
        );

        let mut req = self
            .client
            .post(&self.base_url)
            .header("Content-Type", "application/json");
        if let Some(ref api_key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }
        for (name, value) in &self.extra_headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let response = req.json(&body).send().await.map_err(transport_error)?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let retry_after = parse_retry_after_seconds(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status, &body, retry_after));
        }

        let pricing = self.model_info(&request.model);
        let events = sse_blocks(response.bytes_stream())
            .map(move |block| match block {
                Ok(block) => parse_chunk(&block, pricing.as_ref()),
                Err(e) => vec![Err(e)],
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(events))
    }
}

/// Parse one SSE block into zero or more provider events
fn parse_chunk(block: &str, pricing: Option<&ModelInfo>) -> Vec<Result<ProviderEvent>> {
    let (_, Some(data)) = sse_fields(block) else {
        return vec![];
    };
    if data.trim() == "[DONE]" {
        return vec![];
    }
    let chunk = match serde_json::from_str::<ChatChunk>(&data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::debug!("Skipping unparseable stream chunk: {}", e);
            return vec![];
        }
    };

    if let Some(error) = chunk.error {
        return vec![Err(TetherError::Api(ApiError::StreamError(error.message)))];
    }

    let mut events = Vec::new();
    for choice in chunk.choices {
        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
            events.push(Ok(ProviderEvent::Text { text }));
        }
    }
    if let Some(usage) = chunk.usage {
        let mut usage = Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            cache_read_tokens: usage
                .prompt_tokens_details
                .map(|d| d.cached_tokens)
                .unwrap_or(0),
            ..Default::default()
        };
        usage.cost = pricing.map(|p| p.cost_for(&usage));
        events.push(Ok(ProviderEvent::Usage(usage)));
    }
    events
}

// Chat completions API types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
    stream_options: StreamOptions,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    error: Option<ChatErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    delta: ChatDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChatDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatError {
    error: ChatErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ChatErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
}
