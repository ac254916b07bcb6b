//! Knowledge store access for retrieval-augmented runs
//!
//! A knowledge store answers hybrid queries (full text + dense vector) with
//! the top-k chunks fused by reciprocal rank. Two implementations exist: an
//! HTTP client for a hybrid-search RPC and an in-memory store over a JSON
//! chunk file.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::KnowledgeConfig;
use crate::error::{EvalError, Result};

pub mod fusion;
pub mod http;
pub mod memory;

pub use fusion::{RankedList, fuse_rrf};
pub use http::HttpKnowledgeStore;
pub use memory::InMemoryKnowledgeStore;

/// Context injected when retrieval fails or returns nothing
pub const NO_KNOWLEDGE_SENTINEL: &str = "no relevant knowledge found";

/// Environment variable holding the knowledge store service key
pub const KNOWLEDGE_KEY_ENV: &str = "KNOWLEDGE_STORE_KEY";

/// A retrievable passage of the research corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub id: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub section: String,
    pub content: String,
    #[serde(default, alias = "topic_tags")]
    pub topics: Vec<String>,
}

/// A hybrid search request
#[derive(Debug, Clone)]
pub struct HybridQuery {
    pub text: String,
    pub embedding: Vec<f32>,
    pub top_k: usize,
    pub full_text_weight: f64,
    pub semantic_weight: f64,
    pub rrf_k: u32,
}

/// Trait for knowledge store implementations
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Top-k chunks for the query, best first
    async fn hybrid_search(&self, query: &HybridQuery) -> Result<Vec<KnowledgeChunk>>;

    /// Short description recorded in run artifacts
    fn describe(&self) -> String;
}

/// Render chunks as a context block with per-chunk source and section headers
pub fn format_context(chunks: &[KnowledgeChunk]) -> String {
    if chunks.is_empty() {
        return NO_KNOWLEDGE_SENTINEL.to_string();
    }

    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut header = format!("[{}] Source: {}", i + 1, or_unknown(&chunk.source));
            header.push_str(&format!(" | Section: {}", or_unknown(&chunk.section)));
            format!("{}\n{}", header, chunk.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn or_unknown(value: &str) -> &str {
    if value.trim().is_empty() {
        "unknown"
    } else {
        value
    }
}

/// Factory for creating knowledge stores from configuration
pub struct KnowledgeStoreFactory;

impl KnowledgeStoreFactory {
    /// Build the configured store. A local chunk file takes precedence over a URL.
    ///
    /// `dimension` is used to embed chunks that carry no stored vector.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is configured, the chunk file is
    /// unreadable, or the service key is missing.
    pub fn create(
        config: &KnowledgeConfig,
        timeout: Duration,
        dimension: usize,
    ) -> Result<Arc<dyn KnowledgeStore>> {
        if let Some(path) = &config.chunks_path {
            return Ok(Arc::new(InMemoryKnowledgeStore::from_file(path, dimension)?));
        }

        let url = config.url.as_ref().ok_or_else(|| {
            EvalError::Configuration(
                "knowledge store requires knowledge.url or knowledge.chunks_path".to_string(),
            )
        })?;

        let api_key = match &config.api_key {
            Some(key) => key.clone(),
            None => std::env::var(KNOWLEDGE_KEY_ENV).map_err(|_| {
                EvalError::Configuration(format!(
                    "{} environment variable not set",
                    KNOWLEDGE_KEY_ENV
                ))
            })?,
        };

        Ok(Arc::new(
            HttpKnowledgeStore::new(url.clone(), config.function.clone(), api_key)
                .with_timeout(timeout),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, source: &str, section: &str, content: &str) -> KnowledgeChunk {
        KnowledgeChunk {
            id: id.to_string(),
            source: source.to_string(),
            section: section.to_string(),
            content: content.to_string(),
            topics: Vec::new(),
        }
    }

    #[test]
    fn test_format_context_headers() {
        let context = format_context(&[
            chunk("c1", "Rulebook 2025", "Stations", "Sled push: 50m total."),
            chunk("c2", "", "Nutrition", "Carb load 24h prior.\n"),
        ]);

        assert!(context.starts_with("[1] Source: Rulebook 2025 | Section: Stations\nSled push: 50m total."));
        assert!(context.contains("[2] Source: unknown | Section: Nutrition\nCarb load 24h prior."));
        assert!(context.contains("\n\n---\n\n"));
    }

    #[test]
    fn test_format_context_empty_is_sentinel() {
        assert_eq!(format_context(&[]), NO_KNOWLEDGE_SENTINEL);
    }

    #[test]
    fn test_chunk_accepts_topic_tags_alias() {
        let parsed: KnowledgeChunk = serde_json::from_str(
            r#"{"id":"c9","content":"x","topic_tags":["pacing"]}"#,
        )
        .unwrap();
        assert_eq!(parsed.topics, vec!["pacing"]);
        assert_eq!(parsed.source, "");
    }

    #[test]
    fn test_factory_requires_location() {
        let config = KnowledgeConfig::default();
        assert!(matches!(
            KnowledgeStoreFactory::create(&config, Duration::from_secs(1), 8),
            Err(EvalError::Configuration(_))
        ));
    }

    #[test]
    fn test_factory_http_with_explicit_key() {
        let config = KnowledgeConfig {
            url: Some("http://localhost:54321".to_string()),
            api_key: Some("service-key".to_string()),
            ..KnowledgeConfig::default()
        };
        let store = KnowledgeStoreFactory::create(&config, Duration::from_secs(1), 8).unwrap();
        assert!(store.describe().contains("hybrid_search"));
    }
}
