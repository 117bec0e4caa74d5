// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tether::agent::{Agent, AgentConfig, ModelDescriptor, TaskInput};
use tether::config::Settings;
use tether::llm::factory::ProviderFactory;
use tether::tools::{SchemaBuilder, Tool, ToolContext, ToolDefinition};
use tether::error::ApiError;
use tether::{Result, TetherError};

struct ClockTool;

#[async_trait]
impl Tool for ClockTool {
    fn name(&self) -> &str {
        "clock"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("clock", "Current UTC time", SchemaBuilder::new().build())
    }

    async fn execute(&self, _params: Value, _context: &ToolContext) -> Result<String> {
        Ok("2025-01-01T12:00:00Z".to_string())
    }
}

fn openai_sse(chunks: &[&str], prompt_tokens: u32, completion_tokens: u32) -> String {
    let mut body: String = chunks
        .iter()
        .map(|text| format!("data: {}\n\n", json!({"choices": [{"delta": {"content": text}}]})))
        .collect();
    body.push_str(&format!(
        "data: {}\n\n",
        json!({"choices": [], "usage": {"prompt_tokens": prompt_tokens, "completion_tokens": completion_tokens}})
    ));
    body.push_str("data: [DONE]\n\n");
    body
}

fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

#[test]
fn test_supported_providers() {
    let providers = ProviderFactory::supported_providers();
    assert_eq!(providers, &["anthropic", "openai", "openrouter", "ollama"]);
}

#[tokio::test]
async fn test_agent_over_openai_compatible_stream() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-integration"))
        .respond_with(sse_response(openai_sse(
            &["Let me check.\n<tool_", "call name=\"clock\"/>"],
            100,
            12,
        )))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("tool_result"))
        .respond_with(sse_response(openai_sse(
            &["<attempt_completion>It is noon", " UTC.</attempt_completion>"],
            140,
            9,
        )))
        .mount(&server)
        .await;

    let mut settings = Settings::default();
    settings.providers.openai.api_key = Some("sk-integration".to_string());
    settings.providers.openai.api_key_env = Some("TETHER_TEST_UNSET_OPENAI_KEY".to_string());
    settings.providers.openai.base_url = Some(format!("{}/v1/chat/completions", server.uri()));

    let config = AgentConfig::from_settings(ModelDescriptor::config("openai", "gpt-4o"), &settings)
        .with_tool(Arc::new(ClockTool));
    let agent = Agent::new(config, &settings).unwrap();

    let result = agent
        .task(TaskInput::new("What time is it?"))
        .await
        .unwrap()
        .into_result()
        .await
        .unwrap();

    assert_eq!(result.content, json!("It is noon UTC."));
    assert_eq!(result.metadata.tool_calls.len(), 1);
    assert_eq!(result.metadata.tool_calls[0].name, "clock");
    assert_eq!(result.metadata.usage.input_tokens, 240);
    assert_eq!(result.metadata.usage.output_tokens, 21);
    assert!(result.metadata.usage.cost.is_some());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_agent_surfaces_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
        ))
        .mount(&server)
        .await;

    let mut settings = Settings::default();
    settings.providers.anthropic.api_key = Some("bad-key".to_string());
    settings.providers.anthropic.api_key_env = Some("TETHER_TEST_UNSET_ANTHROPIC_KEY".to_string());
    settings.providers.anthropic.base_url = Some(server.uri());

    let config = AgentConfig::new(ModelDescriptor::config("anthropic", "claude-sonnet-4-20250514"));
    let agent = Agent::new(config, &settings).unwrap();

    let err = agent.task(TaskInput::new("hello")).await.unwrap_err();
    assert!(matches!(
        err,
        TetherError::Api(ApiError::AuthenticationFailed)
    ));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    let mut settings = Settings::default();
    settings.providers.openai.api_key = Some("sk-offline".to_string());
    settings.providers.openai.base_url = Some("http://127.0.0.1:1/v1/chat/completions".to_string());

    let config = AgentConfig::new(ModelDescriptor::config("openai", "gpt-4o"));
    let agent = Agent::new(config, &settings).unwrap();

    let err = agent.task(TaskInput::new("hello")).await.unwrap_err();
    assert!(matches!(err, TetherError::Api(ApiError::Network(_))));
}
