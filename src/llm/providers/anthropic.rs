// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Anthropic Claude API provider implementation
//!
//! Streams the Messages API and maps its SSE events onto text and usage
//! events.

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

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, ANTHROPIC_API_URL)
    }

    /// Create with a custom base URL
    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    fn convert_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
        messages
            .iter()
            .map(|m| AnthropicMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    fn build_request(&self, request: &MessageRequest) -> AnthropicRequest {
        AnthropicRequest {
            model: request.model.clone(),
            messages: Self::convert_messages(&request.messages),
            system: Some(request.system.clone()).filter(|s| !s.is_empty()),
            max_tokens: request.max_tokens,
            temperature: Some(request.temperature),
            stream: true,
        }
    }

    /// Parse an error response
    fn parse_error(status: u16, body: &str, retry_after: Option<u64>) -> TetherError {
        let Ok(error_response) = serde_json::from_str::<AnthropicError>(body) else {
            return server_error(status, body);
        };
        let message = error_response.error.message;
        match error_response.error.error_type.as_str() {
            "authentication_error" => TetherError::Api(ApiError::AuthenticationFailed),
            "rate_limit_error" => {
                TetherError::Api(ApiError::RateLimited(retry_after.unwrap_or(10) as u32))
            }
            "not_found_error" => TetherError::Api(ApiError::ModelNotFound(message)),
            "invalid_request_error" => {
                // "prompt is too long: 215300 tokens > 200000 maximum"
                if message.contains("too long")
                    || message.contains("tokens") && message.contains("maximum")
                {
                    let (current, limit) = parse_numeric_token_counts(&message);
                    TetherError::Api(ApiError::ContextTooLong { current, limit })
                } else {
                    TetherError::Api(ApiError::InvalidResponse(message))
                }
            }
            _ => server_error(status, message),
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "claude-sonnet-4-20250514".to_string(),
                display_name: "Claude Sonnet 4".to_string(),
                context_window: 200_000,
                max_output_tokens: 64_000,
                input_cost_per_1k: 0.003,
                output_cost_per_1k: 0.015,
            },
            ModelInfo {
                id: "claude-opus-4-20250514".to_string(),
                display_name: "Claude Opus 4".to_string(),
                context_window: 200_000,
                max_output_tokens: 32_000,
                input_cost_per_1k: 0.015,
                output_cost_per_1k: 0.075,
            },
            ModelInfo {
                id: "claude-3-5-haiku-20241022".to_string(),
                display_name: "Claude 3.5 Haiku".to_string(),
                context_window: 200_000,
                max_output_tokens: 8_192,
                input_cost_per_1k: 0.0008,
                output_cost_per_1k: 0.004,
            },
        ]
    }

    async fn create_message(&self, request: MessageRequest) -> Result<ProviderStream> {
        let body = self.build_request(&request);
        tracing::debug!(
            model = %body.model,
            messages = body.messages.len(),
            "Sending Anthropic request"
        );

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            // Extract Retry-After header before consuming response body
            let retry_after = parse_retry_after_seconds(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status, &body, retry_after));
        }

        let pricing = self.model_info(&request.model);
        let events = sse_blocks(response.bytes_stream()).filter_map(move |block| {
            let event = match block {
                Ok(block) => parse_sse_event(&block, pricing.as_ref()),
                Err(e) => Some(Err(e)),
            };
            futures::future::ready(event)
        });

        Ok(Box::pin(events))
    }
}

/// Parse one Server-Sent Event into a provider event.
/// Events that carry neither text nor usage are dropped.
fn parse_sse_event(block: &str, pricing: Option<&ModelInfo>) -> Option<Result<ProviderEvent>> {
    let (event_type, data) = sse_fields(block);
    let data = data?;
    let parsed: serde_json::Value = serde_json::from_str(&data).ok()?;

    let priced = |mut usage: Usage| {
        usage.cost = pricing.map(|p| p.cost_for(&usage));
        Some(Ok(ProviderEvent::Usage(usage)))
    };

    match event_type? {
        "message_start" => {
            // output_tokens here is a placeholder; message_delta carries the real count
            let usage = &parsed["message"]["usage"];
            priced(Usage {
                input_tokens: usage["input_tokens"].as_u64().unwrap_or(0) as u32,
                cache_write_tokens: usage["cache_creation_input_tokens"].as_u64().unwrap_or(0)
                    as u32,
                cache_read_tokens: usage["cache_read_input_tokens"].as_u64().unwrap_or(0) as u32,
                ..Default::default()
            })
        }
        "content_block_delta" => {
            let delta = &parsed["delta"];
            match delta["type"].as_str()? {
                "text_delta" => Some(Ok(ProviderEvent::text(delta["text"].as_str()?))),
                _ => None,
            }
        }
        "message_delta" => {
            let usage = parsed.get("usage")?;
            priced(Usage {
                output_tokens: usage["output_tokens"].as_u64().unwrap_or(0) as u32,
                ..Default::default()
            })
        }
        "error" => {
            let error_type = parsed["error"]["type"].as_str().unwrap_or("error");
            let message = parsed["error"]["message"].as_str().unwrap_or("unknown");
            Some(Err(TetherError::Api(ApiError::StreamError(format!(
                "{}: {}",
                error_type, message
            )))))
        }
        _ => None,
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}
