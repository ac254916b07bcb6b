//! Factory for creating embedding providers from configuration

use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmbeddingProviderKind, EmbeddingsConfig};
use crate::embeddings::providers::{EmbeddingProvider, HashingEmbeddings, OpenAIEmbeddings};
use crate::error::{EvalError, Result};

/// Factory for creating embedding providers
pub struct EmbeddingProviderFactory;

impl EmbeddingProviderFactory {
    /// Create an embedding provider from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be created (e.g., missing API key)
    pub fn create(
        config: &EmbeddingsConfig,
        timeout: Duration,
    ) -> Result<Arc<dyn EmbeddingProvider>> {
        match config.provider {
            EmbeddingProviderKind::Hashing => Ok(Arc::new(HashingEmbeddings::new(config.dimension)?)),
            EmbeddingProviderKind::OpenAI => {
                let api_key = match &config.api_key {
                    Some(key) => key.clone(),
                    None => std::env::var("OPENAI_API_KEY").map_err(|_| {
                        EvalError::Configuration(
                            "OPENAI_API_KEY environment variable not set".to_string(),
                        )
                    })?,
                };
                let mut provider =
                    OpenAIEmbeddings::new(api_key, config.model.clone(), config.dimension)
                        .with_timeout(timeout);
                if let Some(base_url) = &config.base_url {
                    provider = provider.with_base_url(base_url.clone());
                }
                Ok(Arc::new(provider))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_from_config() {
        let config = EmbeddingsConfig {
            provider: EmbeddingProviderKind::Hashing,
            dimension: 32,
            ..EmbeddingsConfig::default()
        };
        let provider = EmbeddingProviderFactory::create(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(provider.dimension(), 32);
        assert_eq!(provider.model_name(), "hashing-32");
    }

    #[test]
    fn test_openai_with_explicit_key() {
        let config = EmbeddingsConfig {
            api_key: Some("sk-test".to_string()),
            ..EmbeddingsConfig::default()
        };
        let provider = EmbeddingProviderFactory::create(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(provider.model_name(), "text-embedding-3-small");
        assert_eq!(provider.dimension(), 1536);
    }
}
