// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Task-executing agent
//!
//! An [`Agent`] owns a model provider, a tool registry and a prompt
//! strategy. Each call to [`Agent::task`] runs a bounded loop: the model
//! either asks for tools, whose results are fed back, or finishes with a
//! completion block.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use tether::agent::{Agent, AgentConfig, ModelDescriptor, TaskInput};
//! use tether::config::Settings;
//!
//! let settings = Settings::load()?;
//! let config = AgentConfig::from_settings(
//!     ModelDescriptor::config("anthropic", "claude-sonnet-4-20250514"),
//!     &settings,
//! )
//! .with_role("You are a careful release engineer.");
//!
//! let agent = Agent::new(config, &settings)?;
//! for warning in agent.initialize().await {
//!     eprintln!("{}", warning);
//! }
//!
//! let result = agent.task(TaskInput::new("Bump the patch version")).await?.into_result().await?;
//! println!("{}", result.content);
//! ```

pub mod parser;
pub mod runner;
pub mod types;

pub use parser::{parse_response, ParsedResponse, ResponseScanner, ToolCall, TurnAction};
pub use types::{
    StreamingTask, TaskInput, TaskMetadata, TaskOutcome, TaskResult, TaskState, ToolCallRecord,
};

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::config::Settings;
use crate::error::{Result, TetherError};
use crate::llm::factory::ProviderFactory;
use crate::llm::provider::LlmProvider;
use crate::prompt::{PromptConfig, SystemPromptBuilder};
use crate::tools::{Tool, ToolRegistry};

/// Which model the agent talks to
#[derive(Clone)]
pub enum ModelDescriptor {
    /// A ready provider
    Provider(Arc<dyn LlmProvider>),
    /// A provider name and model id, resolved through [`ProviderFactory`]
    Config { provider: String, model: String },
}

impl ModelDescriptor {
    /// Describe a model by provider name and model id
    pub fn config(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self::Config {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Use an existing provider
    pub fn provider(provider: Arc<dyn LlmProvider>) -> Self {
        Self::Provider(provider)
    }

    fn resolve(&self, settings: &Settings) -> Result<Arc<dyn LlmProvider>> {
        match self {
            ModelDescriptor::Provider(provider) => Ok(Arc::clone(provider)),
            ModelDescriptor::Config { provider, model } => {
                ProviderFactory::create(provider, model, settings)
            }
        }
    }
}

impl fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelDescriptor::Provider(provider) => f
                .debug_tuple("Provider")
                .field(&provider.name())
                .finish(),
            ModelDescriptor::Config { provider, model } => f
                .debug_struct("Config")
                .field("provider", provider)
                .field("model", model)
                .finish(),
        }
    }
}

/// Everything needed to build an [`Agent`]
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: ModelDescriptor,
    pub tools: ToolRegistry,
    /// Opening section of the system prompt
    pub role: String,
    pub custom_instructions: Option<String>,
    /// Model calls allowed per task
    pub max_turns: u32,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Directory tools run in; the process cwd when unset
    pub working_directory: Option<PathBuf>,
    pub prompt: PromptConfig,
}

impl AgentConfig {
    /// Create a config with built-in defaults and no tools
    pub fn new(model: ModelDescriptor) -> Self {
        Self::from_settings(model, &Settings::default())
    }

    /// Create a config using the agent defaults from settings
    pub fn from_settings(model: ModelDescriptor, settings: &Settings) -> Self {
        let defaults = &settings.agent;
        Self {
            model,
            tools: ToolRegistry::new(),
            role: String::new(),
            custom_instructions: None,
            max_turns: defaults.max_turns,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            working_directory: defaults.working_directory.clone(),
            prompt: PromptConfig::default(),
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Add one tool
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_custom_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.custom_instructions = Some(instructions.into());
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_prompt(mut self, prompt: PromptConfig) -> Self {
        self.prompt = prompt;
        self
    }
}

pub(crate) struct AgentInner {
    pub(crate) provider: Arc<dyn LlmProvider>,
    pub(crate) tools: ToolRegistry,
    pub(crate) role: String,
    pub(crate) custom_instructions: Option<String>,
    pub(crate) max_turns: u32,
    pub(crate) max_tokens: u32,
    pub(crate) temperature: f32,
    pub(crate) working_directory: PathBuf,
    pub(crate) prompt: SystemPromptBuilder,
    /// One guard per tool so each setup hook runs at most once
    initialized: HashMap<String, OnceCell<()>>,
}

/// Runs tasks against a model with a fixed set of tools
///
/// Cloning is cheap and clones share tool initialization state.
#[derive(Clone)]
pub struct Agent {
    pub(crate) inner: Arc<AgentInner>,
}

impl Agent {
    /// Build an agent, resolving the model descriptor now.
    ///
    /// Fails with [`TetherError::InvalidConfiguration`] when the descriptor
    /// cannot produce a provider or the limits are unusable.
    pub fn new(config: AgentConfig, settings: &Settings) -> Result<Self> {
        if config.max_turns == 0 {
            return Err(TetherError::InvalidConfiguration(
                "max_turns must be at least 1".to_string(),
            ));
        }
        if config.max_tokens == 0 {
            return Err(TetherError::InvalidConfiguration(
                "max_tokens must be at least 1".to_string(),
            ));
        }

        let provider = config.model.resolve(settings)?;
        Ok(Self::assemble(config, provider))
    }

    /// Build an agent around an existing provider with default limits
    pub fn with_provider(provider: Arc<dyn LlmProvider>, tools: ToolRegistry) -> Self {
        let config =
            AgentConfig::new(ModelDescriptor::Provider(Arc::clone(&provider))).with_tools(tools);
        Self::assemble(config, provider)
    }

    fn assemble(config: AgentConfig, provider: Arc<dyn LlmProvider>) -> Self {
        let working_directory = config
            .working_directory
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let initialized = config
            .tools
            .names()
            .into_iter()
            .map(|name| (name.to_string(), OnceCell::new()))
            .collect();

        tracing::debug!(
            provider = provider.name(),
            model = provider.model(),
            tools = config.tools.len(),
            "Agent created"
        );

        Self {
            inner: Arc::new(AgentInner {
                prompt: SystemPromptBuilder::new(&config.prompt),
                provider,
                tools: config.tools,
                role: config.role,
                custom_instructions: config.custom_instructions,
                max_turns: config.max_turns,
                max_tokens: config.max_tokens,
                temperature: config.temperature,
                working_directory,
                initialized,
            }),
        }
    }

    /// The provider tasks are sent to
    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.provider
    }

    /// The tools available to tasks
    pub fn tools(&self) -> &ToolRegistry {
        &self.inner.tools
    }

    pub fn max_turns(&self) -> u32 {
        self.inner.max_turns
    }

    pub fn working_directory(&self) -> &std::path::Path {
        &self.inner.working_directory
    }

    /// Run every tool's setup hook that has not run yet.
    ///
    /// A failing hook does not stop the others. Failures come back as
    /// [`TetherError::ToolInitialization`] warnings and are not retried.
    pub async fn initialize(&self) -> Vec<TetherError> {
        let mut warnings = Vec::new();

        for (name, tool) in self.inner.tools.iter() {
            let Some(cell) = self.inner.initialized.get(name) else {
                continue;
            };

            let mut failure = None;
            let slot = &mut failure;
            cell.get_or_init(|| async move {
                tracing::debug!(tool = %name, "Initializing tool");
                if let Err(e) = tool.initialize().await {
                    *slot = Some(e);
                }
            })
            .await;

            if let Some(e) = failure {
                tracing::warn!(tool = %name, error = %e, "Tool failed to initialize");
                warnings.push(TetherError::ToolInitialization {
                    tool: name.to_string(),
                    message: e.to_string(),
                });
            }
        }

        warnings
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("provider", &self.inner.provider.name())
            .field("model", &self.inner.provider.model())
            .field("tools", &self.inner.tools.names())
            .field("max_turns", &self.inner.max_turns)
            .finish()
    }
}
