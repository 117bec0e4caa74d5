// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool execution engine
//!
//! Runs one tool invocation at a time and folds every failure into an
//! error [`ToolResult`] so the model can see it and try again.

use serde_json::Value;

use super::{ToolContext, ToolRegistry, ToolResult};

/// Dispatches parsed tool invocations against a registry
pub struct ToolExecutor<'a> {
    registry: &'a ToolRegistry,
    context: ToolContext,
}

impl<'a> ToolExecutor<'a> {
    /// Create a new executor
    pub fn new(registry: &'a ToolRegistry, context: ToolContext) -> Self {
        Self { registry, context }
    }

    /// The context tools run with
    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    /// Execute one invocation. Never fails: unknown tools and tool errors
    /// come back as error results.
    pub async fn execute(&self, tool_name: &str, params: Value) -> ToolResult {
        let Some(tool) = self.registry.get(tool_name) else {
            tracing::warn!(tool = %tool_name, "Model invoked an unknown tool");
            return ToolResult::error(
                tool_name,
                format!(
                    "Unknown tool: {}. Available tools: {}",
                    tool_name,
                    self.registry.names().join(", ")
                ),
            );
        };

        tracing::debug!(tool = %tool_name, "Executing tool");
        match tool.execute(params, &self.context).await {
            Ok(output) => {
                tracing::debug!(tool = %tool_name, bytes = output.len(), "Tool succeeded");
                ToolResult::success(tool_name, output)
            }
            Err(e) => {
                tracing::info!(
                    tool = %tool_name,
                    error = %truncate_output(&e.to_string(), 200),
                    "Tool failed"
                );
                ToolResult::error(tool_name, e.to_string())
            }
        }
    }

    /// Render results as the user message fed back to the model
    pub fn results_message(results: &[ToolResult]) -> String {
        results
            .iter()
            .map(|r| {
                format!(
                    "<tool_result name=\"{}\" status=\"{}\">\n{}\n</tool_result>",
                    r.tool_name,
                    if r.is_error() { "error" } else { "success" },
                    r.output_text()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Truncate output for logging
fn truncate_output(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.replace('\n', " "),
        Some((idx, _)) => format!("{}...", s[..idx].replace('\n', " ")),
    }
}
