// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! System prompt composition
//!
//! The prompt is a fixed sequence of built-in sections, any of which can be
//! disabled, followed by caller-supplied [`SectionProvider`]s in the order
//! they were added. Sections are joined with blank lines.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::agent::parser::{COMPLETION_CLOSE, COMPLETION_OPEN, TOOL_CALL_TAG};
use crate::thread::Thread;
use crate::tools::ToolRegistry;

const DEFAULT_ROLE: &str =
    "You are a capable assistant that completes tasks step by step using the tools available to you.";

/// Built-in prompt sections, in render order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Role,
    Capabilities,
    ToolUseRules,
    OutputSchema,
    CustomInstructions,
    Context,
}

impl SectionKind {
    /// Every built-in section, in render order
    pub const ALL: [SectionKind; 6] = [
        SectionKind::Role,
        SectionKind::Capabilities,
        SectionKind::ToolUseRules,
        SectionKind::OutputSchema,
        SectionKind::CustomInstructions,
        SectionKind::Context,
    ];
}

/// What a section may draw on when rendering
pub struct PromptInputs<'a> {
    pub role: &'a str,
    pub tools: &'a ToolRegistry,
    pub custom_instructions: Option<&'a str>,
    pub output_schema: Option<&'a Value>,
    pub thread: &'a Thread,
}

/// An extra prompt section supplied by the embedder
pub trait SectionProvider: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Text to splice into the prompt, or `None` to contribute nothing
    fn render(&self, inputs: &PromptInputs<'_>) -> Option<String>;
}

/// Section selection for an agent
#[derive(Clone, Default)]
pub struct PromptConfig {
    /// Built-in sections to leave out
    pub disabled: Vec<SectionKind>,
    /// Extra sections appended after the built-in ones
    pub custom: Vec<Arc<dyn SectionProvider>>,
}

impl PromptConfig {
    /// Leave out a built-in section
    pub fn disable(mut self, kind: SectionKind) -> Self {
        if !self.disabled.contains(&kind) {
            self.disabled.push(kind);
        }
        self
    }

    /// Append a custom section
    pub fn with_section(mut self, provider: Arc<dyn SectionProvider>) -> Self {
        self.custom.push(provider);
        self
    }
}

impl std::fmt::Debug for PromptConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let custom: Vec<&str> = self.custom.iter().map(|p| p.name()).collect();
        f.debug_struct("PromptConfig")
            .field("disabled", &self.disabled)
            .field("custom", &custom)
            .finish()
    }
}

/// Renders the system prompt from a resolved [`PromptConfig`]
#[derive(Clone)]
pub struct SystemPromptBuilder {
    sections: Vec<SectionKind>,
    custom: Vec<Arc<dyn SectionProvider>>,
}

impl SystemPromptBuilder {
    /// Resolve which sections are rendered
    pub fn new(config: &PromptConfig) -> Self {
        Self {
            sections: SectionKind::ALL
                .into_iter()
                .filter(|kind| !config.disabled.contains(kind))
                .collect(),
            custom: config.custom.clone(),
        }
    }

    /// Built-in sections that will be considered, in order
    pub fn sections(&self) -> &[SectionKind] {
        &self.sections
    }

    /// Render the prompt
    pub fn build(&self, inputs: &PromptInputs<'_>) -> String {
        let mut parts: Vec<String> = self
            .sections
            .iter()
            .filter_map(|kind| render_section(*kind, inputs))
            .collect();

        for provider in &self.custom {
            match provider.render(inputs) {
                Some(text) if !text.trim().is_empty() => parts.push(text),
                _ => tracing::debug!(section = provider.name(), "Custom prompt section is empty"),
            }
        }

        parts.join("\n\n")
    }
}

impl std::fmt::Debug for SystemPromptBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemPromptBuilder")
            .field("sections", &self.sections)
            .field("custom", &self.custom.len())
            .finish()
    }
}

fn render_section(kind: SectionKind, inputs: &PromptInputs<'_>) -> Option<String> {
    match kind {
        SectionKind::Role => {
            let role = inputs.role.trim();
            Some(if role.is_empty() { DEFAULT_ROLE } else { role }.to_string())
        }
        SectionKind::Capabilities => Some(capabilities(inputs.tools)),
        SectionKind::ToolUseRules => Some(tool_use_rules()),
        SectionKind::OutputSchema => inputs.output_schema.map(|_| {
            format!(
                "# Output format\n\n\
                 The text inside {} must be a single JSON value that conforms to the schema \
                 given in <output_schema>. Write only the JSON, with no commentary around it.",
                COMPLETION_OPEN
            )
        }),
        SectionKind::CustomInstructions => inputs
            .custom_instructions
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(|text| format!("# Additional instructions\n\n{}", text)),
        SectionKind::Context => inputs.thread.render_context(),
    }
}

fn capabilities(tools: &ToolRegistry) -> String {
    if tools.is_empty() {
        return "# Tools\n\nNo tools are available for this task.".to_string();
    }

    let mut out = String::from("# Tools\n");
    for definition in tools.definitions() {
        out.push_str(&format!("\n## {}\n{}\n", definition.name, definition.description));
        let params = definition.parameters();
        if params.is_empty() {
            out.push_str("Parameters: none\n");
            continue;
        }
        out.push_str("Parameters:\n");
        for param in params {
            out.push_str(&format!(
                "- {} ({}{}): {}\n",
                param.name,
                param.param_type,
                if param.required { ", required" } else { "" },
                param.description
            ));
        }
    }
    out.trim_end().to_string()
}

fn tool_use_rules() -> String {
    format!(
        "# Using tools\n\n\
         Invoke a tool by writing a block with one tag per parameter:\n\n\
         <{tag} name=\"tool_name\">\n<parameter_name>value</parameter_name>\n</{tag}>\n\n\
         A tool with no parameters can be written as <{tag} name=\"tool_name\"/>. \
         You may invoke several tools in one response; they run in order and their \
         results arrive in the next message.\n\n\
         Use <thinking>...</thinking> for private reasoning.\n\n\
         When the task is finished, give the final answer inside \
         {open}...{close}. Everything inside is returned to the user as the result. \
         Only the first completion block counts, and nothing after it is acted on.",
        tag = TOOL_CALL_TAG,
        open = COMPLETION_OPEN,
        close = COMPLETION_CLOSE,
    )
}
