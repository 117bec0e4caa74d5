// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider factory for creating LLM providers
//!
//! Resolves a provider name and model id into a ready client. Credentials
//! come from the `Settings` passed in; nothing below this point reads the
//! environment.

use std::sync::Arc;

use crate::config::Settings;
use crate::error::{Result, TetherError};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::{AnthropicProvider, OpenAiCompatibleProvider};

/// Factory for creating LLM providers
pub struct ProviderFactory;

impl ProviderFactory {
    /// Provider names [`create`](Self::create) understands
    pub fn supported_providers() -> &'static [&'static str] {
        &["anthropic", "openai", "openrouter", "ollama"]
    }

    /// Create an LLM provider from a provider name and model id
    ///
    /// An empty `model` falls back to the provider's configured default.
    /// Unknown providers, missing credentials and unresolvable models fail
    /// with [`TetherError::InvalidConfiguration`].
    pub fn create(provider: &str, model: &str, settings: &Settings) -> Result<Arc<dyn LlmProvider>> {
        if !Self::supported_providers().contains(&provider) {
            return Err(TetherError::InvalidConfiguration(format!(
                "Unknown provider '{}'. Supported: {}",
                provider,
                Self::supported_providers().join(", ")
            )));
        }

        let model = Some(model.trim().to_string())
            .filter(|m| !m.is_empty())
            .or_else(|| settings.default_model_for(provider))
            .ok_or_else(|| {
                TetherError::InvalidConfiguration(format!(
                    "No model given for provider '{}' and no default configured",
                    provider
                ))
            })?;

        let client: Arc<dyn LlmProvider> = match provider {
            "anthropic" => {
                let api_key = Self::require_key(provider, settings)?;
                Arc::new(match settings.base_url_for(provider) {
                    Some(base_url) => AnthropicProvider::with_base_url(api_key, &model, base_url),
                    None => AnthropicProvider::new(api_key, &model),
                })
            }
            "openai" => {
                let api_key = Self::require_key(provider, settings)?;
                Arc::new(Self::with_base_url(
                    OpenAiCompatibleProvider::openai(api_key, &model),
                    provider,
                    settings,
                ))
            }
            "openrouter" => {
                let api_key = Self::require_key(provider, settings)?;
                Arc::new(Self::with_base_url(
                    OpenAiCompatibleProvider::openrouter(api_key, &model),
                    provider,
                    settings,
                ))
            }
            _ => Arc::new(Self::with_base_url(
                OpenAiCompatibleProvider::ollama(&model),
                provider,
                settings,
            )),
        };

        if !client.supports_model(&model) {
            tracing::warn!(
                provider,
                model = %model,
                "Model is not in the known list; usage will not be priced"
            );
        }
        tracing::debug!(provider, model = %model, "Resolved model provider");
        Ok(client)
    }

    fn require_key(provider: &str, settings: &Settings) -> Result<String> {
        settings.api_key_for(provider).ok_or_else(|| {
            let var = settings
                .api_key_env_for(provider)
                .unwrap_or_else(|| "an API key".to_string());
            TetherError::InvalidConfiguration(format!(
                "No API key found for provider '{}'. Set {} or add it to the settings file.",
                provider, var
            ))
        })
    }

    fn with_base_url(
        client: OpenAiCompatibleProvider,
        provider: &str,
        settings: &Settings,
    ) -> OpenAiCompatibleProvider {
        match settings.base_url_for(provider) {
            Some(base_url) => client.with_base_url(base_url),
            None => client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_keys() -> Settings {
        let mut settings = Settings::default();
        for provider in ["anthropic", "openai", "openrouter"] {
            let config = settings.providers.get_mut(provider).unwrap();
            config.api_key = Some(format!("{}-key", provider));
        }
        settings
    }

    #[test]
    fn test_supported_providers() {
        let providers = ProviderFactory::supported_providers();
        assert!(providers.contains(&"anthropic"));
        assert!(providers.contains(&"ollama"));
        assert_eq!(providers.len(), 4);
    }

    #[test]
    fn test_create_each_provider() {
        let settings = settings_with_keys();
        for provider in ProviderFactory::supported_providers() {
            let client = ProviderFactory::create(provider, "some-model", &settings).unwrap();
            assert_eq!(client.name(), *provider);
            assert_eq!(client.model(), "some-model");
        }
    }

    #[test]
    fn test_create_uses_default_model() {
        let settings = settings_with_keys();
        let client = ProviderFactory::create("openai", "", &settings).unwrap();
        assert_eq!(client.model(), "gpt-4o");
    }

    #[test]
    fn test_create_unknown_provider() {
        let result = ProviderFactory::create("carrier-pigeon", "m", &Settings::default());
        match result {
            Err(TetherError::InvalidConfiguration(msg)) => assert!(msg.contains("carrier-pigeon")),
            _ => panic!("expected InvalidConfiguration"),
        }
    }

    #[test]
    fn test_create_missing_key() {
        let mut settings = Settings::default();
        settings.providers.anthropic.api_key_env = Some("TETHER_FACTORY_TEST_KEY".to_string());
        let result = ProviderFactory::create("anthropic", "claude-sonnet-4-20250514", &settings);
        match result {
            Err(TetherError::InvalidConfiguration(msg)) => {
                assert!(msg.contains("TETHER_FACTORY_TEST_KEY"))
            }
            _ => panic!("expected InvalidConfiguration"),
        }
    }

    #[test]
    fn test_env_key_needs_explicit_overlay() {
        let mut settings = Settings::default();
        settings.providers.anthropic.api_key_env = Some("TETHER_FACTORY_ENV_ONLY_KEY".to_string());
        std::env::set_var("TETHER_FACTORY_ENV_ONLY_KEY", "sk-env");

        let direct = ProviderFactory::create("anthropic", "claude-sonnet-4-20250514", &settings);
        let overlaid = ProviderFactory::create(
            "anthropic",
            "claude-sonnet-4-20250514",
            &settings.clone().with_env_credentials(),
        );
        std::env::remove_var("TETHER_FACTORY_ENV_ONLY_KEY");

        assert!(matches!(direct, Err(TetherError::InvalidConfiguration(_))));
        assert_eq!(overlaid.unwrap().name(), "anthropic");
    }

    #[test]
    fn test_create_ollama_without_key() {
        let client = ProviderFactory::create("ollama", "llama3", &Settings::default()).unwrap();
        assert_eq!(client.name(), "ollama");
    }
}
