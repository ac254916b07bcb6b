//! Factory for creating LLM providers from configuration

use std::sync::Arc;
use std::time::Duration;

use crate::config::{LLMProviderConfig, LLMProviderKind};
use crate::error::{EvalError, Result};
use crate::llm::LLMProvider;

#[cfg(feature = "llm-openai")]
use crate::llm::providers::openai::OpenAIProvider;

#[cfg(feature = "llm-anthropic")]
use crate::llm::providers::anthropic::AnthropicProvider;

/// Factory for creating LLM providers
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Create an LLM provider from configuration.
    ///
    /// The API key comes from the config when set, otherwise from the
    /// provider's environment variable. Every request is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be created (e.g., missing API key)
    pub fn create(config: &LLMProviderConfig, timeout: Duration) -> Result<Arc<dyn LLMProvider>> {
        if config.model.trim().is_empty() {
            return Err(EvalError::Configuration(format!(
                "{} provider configured without a model",
                config.provider.as_str()
            )));
        }

        let api_key = match &config.api_key {
            Some(key) => key.clone(),
            None => std::env::var(config.provider.api_key_env()).map_err(|_| {
                EvalError::Configuration(format!(
                    "{} environment variable not set",
                    config.provider.api_key_env()
                ))
            })?,
        };

        match config.provider {
            #[cfg(feature = "llm-openai")]
            LLMProviderKind::OpenAI => {
                let provider = match &config.base_url {
                    Some(base_url) => {
                        OpenAIProvider::with_base_url(api_key, config.model.clone(), base_url.clone())
                    }
                    None => OpenAIProvider::new(api_key, config.model.clone()),
                };
                Ok(Arc::new(provider.with_timeout(timeout)))
            }

            #[cfg(not(feature = "llm-openai"))]
            LLMProviderKind::OpenAI => Err(EvalError::Configuration(
                "OpenAI provider requires 'llm-openai' feature".to_string(),
            )),

            #[cfg(feature = "llm-anthropic")]
            LLMProviderKind::Anthropic => {
                let provider = match &config.base_url {
                    Some(base_url) => AnthropicProvider::with_base_url(
                        api_key,
                        config.model.clone(),
                        base_url.clone(),
                    ),
                    None => AnthropicProvider::new(api_key, config.model.clone()),
                };
                Ok(Arc::new(provider.with_timeout(timeout)))
            }

            #[cfg(not(feature = "llm-anthropic"))]
            LLMProviderKind::Anthropic => Err(EvalError::Configuration(
                "Anthropic provider requires 'llm-anthropic' feature".to_string(),
            )),
        }
    }
}
