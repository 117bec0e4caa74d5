// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock LLM provider for testing
//!
//! Provides a scripted implementation of the LlmProvider trait that can be
//! used in tests (and by embedders) without making real API calls.

use async_trait::async_trait;
use futures::stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ApiError, Result};
use crate::llm::provider::{
    LlmProvider, MessageRequest, ModelInfo, ProviderEvent, ProviderStream, Usage,
};

/// A mock LLM provider for testing
#[derive(Clone)]
pub struct MockProvider {
    /// Provider name
    name: String,
    /// Scripted responses, one per call; the last one repeats
    responses: Arc<Mutex<Vec<MockResponse>>>,
    /// Call counter
    call_count: Arc<AtomicUsize>,
    /// Recorded requests
    recorded_requests: Arc<Mutex<Vec<MessageRequest>>>,
    /// Available models
    models: Vec<ModelInfo>,
}

/// A pre-configured response for the mock provider
#[derive(Clone, Debug)]
pub struct MockResponse {
    /// Text content to return
    pub text: String,
    /// Split the text into fragments of this many chars (whole text when `None`)
    pub chunk_size: Option<usize>,
    /// Token usage reported after the text
    pub usage: Usage,
    /// Fail the call with this message instead of answering
    pub error: Option<String>,
}

impl MockResponse {
    /// A text response with default usage
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// A response that fails the provider call
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Stream the text in fragments of `size` chars
    pub fn chunked(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    /// Report this usage
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    fn into_events(self) -> Vec<Result<ProviderEvent>> {
        let mut events: Vec<Result<ProviderEvent>> = match self.chunk_size {
            Some(size) => self
                .text
                .chars()
                .collect::<Vec<_>>()
                .chunks(size)
                .map(|chunk| Ok(ProviderEvent::text(chunk.iter().collect::<String>())))
                .collect(),
            None if self.text.is_empty() => vec![],
            None => vec![Ok(ProviderEvent::text(self.text))],
        };
        events.push(Ok(ProviderEvent::Usage(self.usage)));
        events
    }
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            text: "Mock response".to_string(),
            chunk_size: None,
            usage: Usage {
                input_tokens: 10,
                output_tokens: 20,
                ..Default::default()
            },
            error: None,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock provider lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a new mock provider
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            responses: Arc::new(Mutex::new(vec![MockResponse::default()])),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::new(Mutex::new(vec![])),
            models: vec![Self::default_model()],
        }
    }

    /// Create a mock provider with a custom name
    pub fn with_name(name: impl Into<String>) -> Self {
        let mut provider = Self::new();
        provider.name = name.into();
        provider
    }

    fn default_model() -> ModelInfo {
        ModelInfo {
            id: "mock-model".to_string(),
            display_name: "Mock Model".to_string(),
            context_window: 128000,
            max_output_tokens: 8192,
            input_cost_per_1k: 0.0,
            output_cost_per_1k: 0.0,
        }
    }

    /// Answer every call with this text
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_scripted(vec![MockResponse::text(text)])
    }

    /// Queue multiple text responses (returned in order)
    pub fn with_responses<I, S>(self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_scripted(texts.into_iter().map(MockResponse::text).collect())
    }

    /// Queue fully specified responses (returned in order)
    pub fn with_scripted(self, scripted: Vec<MockResponse>) -> Self {
        {
            let mut responses = lock(&self.responses);
            responses.clear();
            responses.extend(scripted);
        }
        self
    }

    /// Add custom models
    pub fn with_models(mut self, models: Vec<ModelInfo>) -> Self {
        self.models = models;
        self
    }

    /// Get the number of times create_message() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get all recorded requests
    pub fn recorded_requests(&self) -> Vec<MessageRequest> {
        lock(&self.recorded_requests).clone()
    }

    /// Get the last request made
    pub fn last_request(&self) -> Option<MessageRequest> {
        lock(&self.recorded_requests).last().cloned()
    }

    /// Reset call count and recorded requests
    pub fn reset(&self) {
        self.call_count.store(0, Ordering::SeqCst);
        lock(&self.recorded_requests).clear();
    }

    fn next_response(&self) -> MockResponse {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        let responses = lock(&self.responses);
        match responses.len() {
            0 => MockResponse::default(),
            len => responses[count.min(len - 1)].clone(),
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        self.models
            .first()
            .map(|m| m.id.as_str())
            .unwrap_or("mock-model")
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        self.models.clone()
    }

    async fn create_message(&self, request: MessageRequest) -> Result<ProviderStream> {
        lock(&self.recorded_requests).push(request);

        let response = self.next_response();
        if let Some(message) = response.error {
            return Err(ApiError::ServerError {
                status: 500,
                message,
            }
            .into());
        }

        Ok(Box::pin(stream::iter(response.into_events())))
    }
}
