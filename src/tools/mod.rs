// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system for Tether
//!
//! Tools are capabilities the model can invoke by name. The agent only
//! knows them through the [`Tool`] trait; what a tool does to the outside
//! world is up to the embedder.

pub mod definition;
pub mod executor;

pub use definition::*;
pub use executor::*;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;

/// Context provided to tools during execution
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Directory the task runs in
    pub working_directory: PathBuf,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(working_directory: PathBuf) -> Self {
        Self { working_directory }
    }

    /// Resolve a tool-supplied path against the working directory
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            self.working_directory.join(path)
        }
    }
}

/// Result of tool execution
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// Name the tool was invoked under
    pub tool_name: String,
    /// The output of the tool
    pub output: ToolOutput,
}

/// Output from a tool
#[derive(Debug, Clone)]
pub enum ToolOutput {
    /// Successful output
    Success(String),
    /// Error output
    Error(String),
}

impl ToolResult {
    /// Create a successful result
    pub fn success(tool_name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            output: ToolOutput::Success(output.into()),
        }
    }

    /// Create an error result
    pub fn error(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            output: ToolOutput::Error(error.into()),
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self.output, ToolOutput::Error(_))
    }

    /// Get the output text
    pub fn output_text(&self) -> &str {
        match &self.output {
            ToolOutput::Success(s) => s,
            ToolOutput::Error(s) => s,
        }
    }
}

/// Trait for implementing tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool definition for the model
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool. Parameters arrive as a flat object of strings;
    /// coercing them is the tool's job. May be called any number of times.
    async fn execute(&self, params: Value, context: &ToolContext) -> Result<String>;

    /// One-time setup, run by the agent before first use
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }
}

/// Registry of available tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Aliases mapping alternate names to canonical tool names
    aliases: HashMap<String, String>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool of the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::debug!(tool = %name, "Replaced previously registered tool");
        }
    }

    /// Builder-style [`register`](Self::register)
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Let the model reach `canonical` under another name
    pub fn register_alias(&mut self, alias: impl Into<String>, canonical: impl Into<String>) {
        self.aliases.insert(alias.into(), canonical.into());
    }

    /// Get a tool by name, resolving aliases if needed
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        // Direct names win over aliases
        if let Some(tool) = self.tools.get(name) {
            return Some(tool);
        }
        self.aliases
            .get(name)
            .and_then(|canonical| self.tools.get(canonical))
    }

    /// Resolve an alias to the canonical tool name
    pub fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str {
        if self.tools.contains_key(name) {
            return name;
        }
        self.aliases.get(name).map(|s| s.as_str()).unwrap_or(name)
    }

    /// All tool definitions, sorted by name so prompts are stable
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// All registered tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Names the model may invoke with: tool names plus aliases
    pub fn invocable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tools
            .keys()
            .chain(self.aliases.keys())
            .cloned()
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Registered tools with their names, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Tool>)> {
        let mut entries: Vec<(&str, &Arc<dyn Tool>)> =
            self.tools.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by_key(|(name, _)| *name);
        entries.into_iter()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("aliases", &self.aliases)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(
                "echo",
                "Echo the text parameter",
                SchemaBuilder::new().string("text", "Text to echo", true).build(),
            )
        }

        async fn execute(&self, params: Value, _context: &ToolContext) -> Result<String> {
            Ok(params["text"].as_str().unwrap_or_default().to_string())
        }
    }

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(self.0, "", SchemaBuilder::new().build())
        }

        async fn execute(&self, _params: Value, _context: &ToolContext) -> Result<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_tool_context_resolve_path() {
        let context = ToolContext::new(PathBuf::from("/work"));
        assert_eq!(context.resolve_path("a/b.txt"), PathBuf::from("/work/a/b.txt"));
        assert_eq!(context.resolve_path("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_tool_result_success() {
        let result = ToolResult::success("echo", "hi");
        assert!(!result.is_error());
        assert_eq!(result.output_text(), "hi");
        assert_eq!(result.tool_name, "echo");
    }

    #[test]
    fn test_tool_result_error() {
        let result = ToolResult::error("echo", "boom");
        assert!(result.is_error());
        assert_eq!(result.output_text(), "boom");
    }

    #[test]
    fn test_tool_registry_new() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get("echo").is_none());
    }

    #[test]
    fn test_tool_registry_sorted_definitions() {
        let registry = ToolRegistry::new()
            .with_tool(Arc::new(NamedTool("zeta")))
            .with_tool(Arc::new(NamedTool("alpha")))
            .with_tool(Arc::new(EchoTool));

        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "echo", "zeta"]);
        assert_eq!(registry.names(), vec!["alpha", "echo", "zeta"]);
        let iterated: Vec<&str> = registry.iter().map(|(name, _)| name).collect();
        assert_eq!(iterated, vec!["alpha", "echo", "zeta"]);
    }

    #[test]
    fn test_tool_registry_register_replaces() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(EchoTool));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_tool_registry_aliases() {
        let mut registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));
        registry.register_alias("say", "echo");
        registry.register_alias("dangling", "missing");

        assert_eq!(registry.get("say").unwrap().name(), "echo");
        assert!(registry.get("dangling").is_none());
        assert_eq!(registry.resolve_alias("say"), "echo");
        assert_eq!(registry.resolve_alias("other"), "other");
        assert_eq!(registry.invocable_names(), vec!["dangling", "echo", "say"]);
    }

    #[test]
    fn test_tool_registry_direct_name_takes_precedence() {
        let mut registry = ToolRegistry::new()
            .with_tool(Arc::new(EchoTool))
            .with_tool(Arc::new(NamedTool("say")));
        registry.register_alias("say", "echo");
        assert_eq!(registry.get("say").unwrap().name(), "say");
        assert_eq!(registry.resolve_alias("say"), "say");
    }

    #[tokio::test]
    async fn test_echo_tool_executes() {
        let context = ToolContext::new(PathBuf::from("."));
        let output = EchoTool
            .execute(serde_json::json!({"text": "hello"}), &context)
            .await
            .unwrap();
        assert_eq!(output, "hello");
        assert!(EchoTool.initialize().await.is_ok());
    }

    #[test]
    fn test_tool_registry_debug() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));
        assert!(format!("{:?}", registry).contains("echo"));
    }
}
