// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for Tether
//!
//! Handles loading and saving settings from ~/.tether/settings.json
//! (or a `.toml` file when the path says so).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod io;
mod validation;

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// LLM provider configurations
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Defaults applied to agents built from these settings
    #[serde(default)]
    pub agent: AgentDefaults,
}

/// Configuration for LLM providers
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    /// Anthropic Claude configuration
    #[serde(default)]
    pub anthropic: ProviderConfig,

    /// OpenAI configuration
    #[serde(default)]
    pub openai: ProviderConfig,

    /// OpenRouter configuration (OpenAI-compatible, many upstream models)
    #[serde(default)]
    pub openrouter: ProviderConfig,

    /// Ollama configuration (OpenAI-compatible local server)
    #[serde(default)]
    pub ollama: ProviderConfig,
}

/// Per-provider connection settings
///
/// Every field is optional; unset fields fall back to the provider's
/// built-in defaults (see [`Settings::api_key_env_for`] and friends).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProviderConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Default model to use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Base URL for API (for custom endpoints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Defaults for the agent task loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaults {
    /// Provider used when a model descriptor names none
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Maximum model turns per task
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Maximum tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Working directory handed to tools (defaults to the process cwd)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
}

fn default_provider() -> String {
    "anthropic".to_string()
}

fn default_max_turns() -> u32 {
    30
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.0
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            max_turns: default_max_turns(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            working_directory: None,
        }
    }
}

impl ProvidersConfig {
    /// Look up the config block for a provider name
    pub fn get(&self, provider: &str) -> Option<&ProviderConfig> {
        match provider {
            "anthropic" => Some(&self.anthropic),
            "openai" => Some(&self.openai),
            "openrouter" => Some(&self.openrouter),
            "ollama" => Some(&self.ollama),
            _ => None,
        }
    }

    /// Mutable lookup of the config block for a provider name
    pub fn get_mut(&mut self, provider: &str) -> Option<&mut ProviderConfig> {
        match provider {
            "anthropic" => Some(&mut self.anthropic),
            "openai" => Some(&mut self.openai),
            "openrouter" => Some(&mut self.openrouter),
            "ollama" => Some(&mut self.ollama),
            _ => None,
        }
    }
}
