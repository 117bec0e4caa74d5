// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{Result, TetherError};
use crate::llm::factory::ProviderFactory;

use super::Settings;

impl Settings {
    /// Name of the env var holding the API key for a provider.
    pub fn api_key_env_for(&self, provider: &str) -> Option<String> {
        let configured = self
            .providers
            .get(provider)
            .and_then(|c| c.api_key_env.clone());
        configured.or_else(|| match provider {
            "anthropic" => Some("ANTHROPIC_API_KEY".to_string()),
            "openai" => Some("OPENAI_API_KEY".to_string()),
            "openrouter" => Some("OPENROUTER_API_KEY".to_string()),
            _ => None,
        })
    }

    /// Copy API keys from each provider's env var into the settings.
    ///
    /// A set, non-empty env var replaces the key from the file. This is the
    /// only place credentials are read from the environment.
    pub fn with_env_credentials(mut self) -> Self {
        for &provider in ProviderFactory::supported_providers() {
            let Some(key) = self
                .api_key_env_for(provider)
                .and_then(|var| std::env::var(var).ok())
                .filter(|key| !key.is_empty())
            else {
                continue;
            };
            if let Some(config) = self.providers.get_mut(provider) {
                tracing::debug!(provider, "Using API key from environment");
                config.api_key = Some(key);
            }
        }
        self
    }

    /// The configured API key for a provider.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|c| c.api_key.clone())
            .filter(|key| !key.is_empty())
    }

    /// Configured base URL override for a provider, if any.
    pub fn base_url_for(&self, provider: &str) -> Option<String> {
        self.providers.get(provider).and_then(|c| c.base_url.clone())
    }

    /// Default model for a provider.
    pub fn default_model_for(&self, provider: &str) -> Option<String> {
        if let Some(model) = self
            .providers
            .get(provider)
            .and_then(|c| c.default_model.clone())
        {
            return Some(model);
        }
        match provider {
            "anthropic" => Some("claude-sonnet-4-20250514".to_string()),
            "openai" => Some("gpt-4o".to_string()),
            "openrouter" => Some("anthropic/claude-sonnet-4".to_string()),
            "ollama" => Some("qwen2.5-coder:14b".to_string()),
            _ => None,
        }
    }

    /// Check if the given provider has a usable configuration.
    /// Ollama needs no key; API-based providers do.
    pub fn is_provider_configured(&self, provider: &str) -> bool {
        match provider {
            "ollama" => true,
            "anthropic" | "openai" | "openrouter" => self.api_key_for(provider).is_some(),
            _ => false,
        }
    }

    /// Reject settings the agent loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !ProviderFactory::supported_providers().contains(&self.agent.provider.as_str()) {
            return Err(TetherError::Config(format!(
                "Unknown default provider '{}'. Supported: {}",
                self.agent.provider,
                ProviderFactory::supported_providers().join(", ")
            )));
        }
        if self.agent.max_turns == 0 {
            return Err(TetherError::Config(
                "agent.max_turns must be at least 1".to_string(),
            ));
        }
        if self.agent.max_tokens == 0 {
            return Err(TetherError::Config(
                "agent.max_tokens must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.agent.temperature) {
            return Err(TetherError::Config(format!(
                "agent.temperature must be within 0.0..=2.0, got {}",
                self.agent.temperature
            )));
        }
        Ok(())
    }
}
