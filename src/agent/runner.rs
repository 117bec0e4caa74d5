// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Task execution loop
//!
//! This module implements the turn loop behind [`Agent::task`], handling:
//! - Prompt composition and the task message
//! - Streaming the model response through the [`ResponseScanner`]
//! - Sequential tool dispatch with results fed back to the model
//! - Completion detection and output schema validation

use chrono::Utc;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::error::{Result, TetherError};
use crate::llm::message::Message;
use crate::llm::provider::{MessageRequest, ProviderEvent, Usage};
use crate::prompt::PromptInputs;
use crate::thread::Thread;
use crate::tools::{ToolContext, ToolExecutor};

use super::parser::{ParsedResponse, ResponseScanner, ToolCall, TurnAction};
use super::types::{StreamingTask, TaskInput, TaskMetadata, TaskOutcome, TaskResult, TaskState, ToolCallRecord};
use super::Agent;

/// Text and usage from one model call
struct TurnOutput {
    parsed: ParsedResponse,
    usage: Usage,
    chars: usize,
}

impl Agent {
    /// Run a task.
    ///
    /// Without `stream`, resolves once the task has finished. With `stream`,
    /// returns immediately with a [`StreamingTask`] while the loop runs in
    /// the background. Streaming together with an output schema is rejected
    /// before anything else happens.
    pub async fn task(&self, input: TaskInput) -> Result<TaskOutcome> {
        if input.stream && input.schema().is_some() {
            tracing::warn!("Rejected streaming task with an output schema");
            return Err(TetherError::StreamingSchemaUnsupported);
        }

        let validator = input.schema().map(compile_schema).transpose()?;

        if input.stream {
            let (tx, rx) = mpsc::unbounded_channel();
            let agent = self.clone();
            let handle = tokio::spawn(async move { agent.run(input, None, Some(tx)).await });
            return Ok(TaskOutcome::Streaming(StreamingTask::new(rx, handle)));
        }

        self.run(input, validator.as_ref(), None)
            .await
            .map(TaskOutcome::Complete)
    }

    async fn run(
        &self,
        input: TaskInput,
        validator: Option<&jsonschema::Validator>,
        fragments: Option<UnboundedSender<String>>,
    ) -> Result<TaskResult> {
        let thread = input.thread.clone().unwrap_or_default();
        let mut state = TaskState::Composing;

        tracing::info!(
            thread = %thread.id(),
            stream = input.stream,
            schema = input.schema().is_some(),
            history = thread.len(),
            "Starting task"
        );

        let outcome = self
            .run_turns(&input, &thread, validator, fragments.as_ref(), &mut state)
            .await;

        match &outcome {
            Ok(result) => {
                transition(&mut state, TaskState::Completed);
                tracing::info!(
                    thread = %thread.id(),
                    turns = result.metadata.turns,
                    tool_calls = result.metadata.tool_calls.len(),
                    tokens = result.metadata.usage.total_tokens(),
                    "Task completed"
                );
            }
            Err(e) => {
                transition(&mut state, TaskState::Failed);
                tracing::warn!(thread = %thread.id(), error = %e, "Task failed");
            }
        }

        outcome
    }

    async fn run_turns(
        &self,
        input: &TaskInput,
        thread: &Thread,
        validator: Option<&jsonschema::Validator>,
        fragments: Option<&UnboundedSender<String>>,
        state: &mut TaskState,
    ) -> Result<TaskResult> {
        let inner = &self.inner;
        let schema = input.schema();

        let system = inner.prompt.build(&PromptInputs {
            role: input.role.as_deref().unwrap_or(&inner.role),
            tools: &inner.tools,
            custom_instructions: inner.custom_instructions.as_deref(),
            output_schema: schema,
            thread,
        });
        thread.append_message(Message::user(task_message(&input.content, schema)));

        let known_tools = inner.tools.invocable_names();
        let executor = ToolExecutor::new(
            &inner.tools,
            ToolContext::new(inner.working_directory.clone()),
        );
        let mut metadata = TaskMetadata::default();

        for turn in 1..=inner.max_turns {
            transition(state, TaskState::AwaitingModel);
            metadata.turns = turn;

            let request = MessageRequest::new(inner.provider.model(), system.clone(), thread.messages())
                .with_max_tokens(inner.max_tokens)
                .with_temperature(inner.temperature);

            let output = self.consume_turn(request, &known_tools, fragments).await?;
            metadata.usage.add(&output.usage);
            metadata.thinking.extend(output.parsed.thinking.iter().cloned());

            tracing::debug!(
                turn,
                chars = output.chars,
                tool_calls = output.parsed.tool_calls.len(),
                completed = output.parsed.completion.is_some(),
                "Model turn finished"
            );

            match output.parsed.action() {
                TurnAction::Complete(text) => {
                    thread.append_message(Message::assistant(text.clone()));
                    let content = match validator {
                        Some(validator) => validate_output(&text, validator)?,
                        None => Value::String(text),
                    };
                    return Ok(TaskResult { content, metadata });
                }
                TurnAction::CallTools(calls) => {
                    transition(state, TaskState::ParsingToolCalls);
                    let rendered = calls
                        .iter()
                        .map(ToolCall::to_markup)
                        .collect::<Vec<_>>()
                        .join("\n");

                    transition(state, TaskState::DispatchingTools);
                    let mut results = Vec::with_capacity(calls.len());
                    for call in calls {
                        let timestamp = Utc::now();
                        let result = executor
                            .execute(&call.name, Value::Object(call.params.clone()))
                            .await;
                        metadata.tool_calls.push(ToolCallRecord {
                            name: call.name,
                            params: call.params,
                            turn,
                            sequence: metadata.tool_calls.len(),
                            timestamp,
                            success: !result.is_error(),
                        });
                        results.push(result);
                    }

                    thread.append_message(Message::assistant(rendered));
                    thread.append_message(Message::user(ToolExecutor::results_message(&results)));
                }
                TurnAction::Nothing => {
                    tracing::debug!(turn, "Model response had no completion and no tool calls");
                    return Err(TetherError::NoCompletionFound);
                }
            }
        }

        Err(TetherError::TurnBudgetExceeded {
            max_turns: inner.max_turns,
        })
    }

    /// Drain one provider stream, parsing as text arrives and forwarding
    /// completion text to `fragments`
    async fn consume_turn(
        &self,
        request: MessageRequest,
        known_tools: &[String],
        fragments: Option<&UnboundedSender<String>>,
    ) -> Result<TurnOutput> {
        let mut stream = self.inner.provider.create_message(request).await?;
        let mut scanner = ResponseScanner::new(known_tools.iter().cloned());
        let mut buffer = String::new();
        let mut usage = Usage::default();

        while let Some(event) = stream.next().await {
            match event? {
                ProviderEvent::Text { text } => {
                    // Text after the completion closes is not acted on
                    if scanner.is_done() {
                        continue;
                    }
                    buffer.push_str(&text);
                    let update = scanner.scan(&buffer);
                    forward(fragments, update.completion_delta);
                }
                ProviderEvent::Usage(reported) => usage.add(&reported),
            }
        }

        let update = scanner.finish(&buffer);
        forward(fragments, update.completion_delta);

        Ok(TurnOutput {
            parsed: scanner.into_parsed(),
            usage,
            chars: buffer.chars().count(),
        })
    }
}

fn forward(fragments: Option<&UnboundedSender<String>>, delta: String) {
    if delta.is_empty() {
        return;
    }
    if let Some(tx) = fragments {
        // The caller may have dropped the stream; the task still runs to the end
        let _ = tx.send(delta);
    }
}

fn transition(state: &mut TaskState, next: TaskState) {
    if *state != next {
        tracing::trace!(from = %state, to = %next, "Task state");
        *state = next;
    }
}

/// The user message that opens a task
pub(crate) fn task_message(content: &str, schema: Option<&Value>) -> String {
    let mut message = format!("<task>\n{}\n</task>", content);
    if let Some(schema) = schema {
        let pretty = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        message.push_str(&format!("\n\n<output_schema>\n{}\n</output_schema>", pretty));
    }
    message
}

fn compile_schema(schema: &Value) -> Result<jsonschema::Validator> {
    jsonschema::Validator::new(schema)
        .map_err(|e| TetherError::InvalidInput(format!("invalid output schema: {}", e)))
}

/// Parse the completion as JSON and check it against the schema
pub(crate) fn validate_output(text: &str, validator: &jsonschema::Validator) -> Result<Value> {
    let payload = strip_code_fence(text);
    let value: Value = serde_json::from_str(payload).map_err(|e| {
        TetherError::SchemaValidationFailed(format!("completion is not valid JSON: {}", e))
    })?;

    let errors: Vec<String> = validator.iter_errors(&value).map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        return Err(TetherError::SchemaValidationFailed(errors.join("; ")));
    }
    Ok(value)
}

/// Remove a surrounding ``` fence, with or without a language tag
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the language tag line
    match body.find('\n') {
        Some(newline) if body[..newline].chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') => {
            body[newline + 1..].trim()
        }
        _ => body.trim(),
    }
}
