// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM Provider trait and related types
//!
//! A provider turns a system prompt plus message history into an ordered
//! stream of text and usage events. Concatenating the `Text` events in
//! order reconstructs the full response.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;
use crate::llm::message::Message;

/// Stream of events produced by [`LlmProvider::create_message`]
pub type ProviderStream = Pin<Box<dyn Stream<Item = Result<ProviderEvent>> + Send>>;

/// Main trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "anthropic", "openai")
    fn name(&self) -> &str;

    /// Model id requests are sent with
    fn model(&self) -> &str;

    /// List known models
    fn available_models(&self) -> Vec<ModelInfo>;

    /// Check if a specific model is supported
    fn supports_model(&self, model: &str) -> bool {
        self.available_models().iter().any(|m| m.id == model)
    }

    /// Get model info by ID
    fn model_info(&self, model: &str) -> Option<ModelInfo> {
        self.available_models().into_iter().find(|m| m.id == model)
    }

    /// Start a message and stream back its events in emission order
    async fn create_message(&self, request: MessageRequest) -> Result<ProviderStream>;

    /// Non-streaming completion: drains [`create_message`](Self::create_message)
    async fn complete(&self, request: MessageRequest) -> Result<Completion> {
        let mut stream = self.create_message(request).await?;
        let mut completion = Completion::default();
        while let Some(event) = stream.next().await {
            match event? {
                ProviderEvent::Text { text } => completion.text.push_str(&text),
                ProviderEvent::Usage(usage) => completion.usage.add(&usage),
            }
        }
        Ok(completion)
    }
}

/// Request for a model message
#[derive(Debug, Clone)]
pub struct MessageRequest {
    /// Model to use
    pub model: String,

    /// System prompt
    pub system: String,

    /// Messages in the conversation, oldest first
    pub messages: Vec<Message>,

    /// Maximum tokens in response
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl MessageRequest {
    /// Create a new request
    pub fn new(
        model: impl Into<String>,
        system: impl Into<String>,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            messages,
            max_tokens: 8192,
            temperature: 0.0,
        }
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// One event from a provider stream
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// A fragment of response text
    Text { text: String },

    /// Token and cost accounting
    Usage(Usage),
}

impl ProviderEvent {
    /// Shorthand for a text event
    pub fn text(text: impl Into<String>) -> Self {
        ProviderEvent::Text { text: text.into() }
    }
}

/// A fully drained response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// Concatenated response text
    pub text: String,
    /// Summed usage
    pub usage: Usage,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens
    pub input_tokens: u32,
    /// Output tokens
    pub output_tokens: u32,
    /// Tokens served from the prompt cache
    #[serde(default)]
    pub cache_read_tokens: u32,
    /// Tokens written to the prompt cache
    #[serde(default)]
    pub cache_write_tokens: u32,
    /// Cost in USD, when the provider can price the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl Usage {
    /// Get total tokens used
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Accumulate another usage report into this one.
    /// Cost stays `None` only while every report so far lacked one.
    pub fn add(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
        self.cache_write_tokens += other.cache_write_tokens;
        self.cost = match (self.cost, other.cost) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
    }
}

/// Information about a model
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model ID
    pub id: String,

    /// Display name
    pub display_name: String,

    /// Context window size
    pub context_window: u32,

    /// Maximum output tokens
    pub max_output_tokens: u32,

    /// Cost per 1K input tokens (USD)
    pub input_cost_per_1k: f64,

    /// Cost per 1K output tokens (USD)
    pub output_cost_per_1k: f64,
}

impl ModelInfo {
    /// Price a usage report with this model's rates
    pub fn cost_for(&self, usage: &Usage) -> f64 {
        (usage.input_tokens as f64 / 1000.0) * self.input_cost_per_1k
            + (usage.output_tokens as f64 / 1000.0) * self.output_cost_per_1k
    }
}
