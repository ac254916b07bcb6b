//! In-memory knowledge store over a JSON chunk file
//!
//! Performs the same hybrid search as the RPC locally: a lexical ranking by
//! query-term overlap and a dense ranking by cosine similarity, fused with
//! weighted RRF.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::fusion::{RankedList, fuse_rrf};
use super::{HybridQuery, KnowledgeChunk, KnowledgeStore};
use crate::embeddings::providers::hashing::tokenize;
use crate::embeddings::{HashingEmbeddings, cosine_similarity};
use crate::error::{EvalError, Result};

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "do", "for", "how", "i", "if",
    "in", "is", "it", "me", "my", "of", "on", "or", "should", "so", "the", "to", "what", "when",
    "which", "with", "you", "your",
];

#[derive(Deserialize)]
struct StoredChunk {
    #[serde(flatten)]
    chunk: KnowledgeChunk,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChunkFile {
    Bare(Vec<StoredChunk>),
    Wrapped { chunks: Vec<StoredChunk> },
}

struct IndexedChunk {
    chunk: KnowledgeChunk,
    embedding: Vec<f32>,
    term_counts: HashMap<String, usize>,
}

/// Knowledge store held entirely in memory
pub struct InMemoryKnowledgeStore {
    chunks: Vec<IndexedChunk>,
    label: String,
}

impl InMemoryKnowledgeStore {
    /// Build from chunks; chunks lacking a vector are embedded with feature
    /// hashing at `dimension`.
    pub fn new(chunks: Vec<(KnowledgeChunk, Option<Vec<f32>>)>, dimension: usize) -> Result<Self> {
        let hasher = HashingEmbeddings::new(dimension)?;
        let mut seen = HashSet::new();
        let mut indexed = Vec::with_capacity(chunks.len());

        for (chunk, embedding) in chunks {
            if !seen.insert(chunk.id.clone()) {
                return Err(EvalError::Library(format!(
                    "duplicate knowledge chunk id '{}'",
                    chunk.id
                )));
            }
            let embedding = match embedding {
                Some(vector) if vector.len() == dimension => vector,
                Some(vector) => {
                    return Err(EvalError::Configuration(format!(
                        "chunk '{}' has a {}-dimensional embedding, expected {}",
                        chunk.id,
                        vector.len(),
                        dimension
                    )));
                }
                None => hasher.embed_text(&searchable_text(&chunk)),
            };
            let mut term_counts = HashMap::new();
            for term in index_terms(&searchable_text(&chunk)) {
                *term_counts.entry(term).or_insert(0) += 1;
            }
            indexed.push(IndexedChunk {
                chunk,
                embedding,
                term_counts,
            });
        }

        Ok(Self {
            chunks: indexed,
            label: "memory".to_string(),
        })
    }

    /// Load a chunk file: either a JSON array of chunks or `{"chunks": [...]}`
    pub fn from_file(path: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let file: ChunkFile = serde_json::from_str(&raw)?;
        let stored = match file {
            ChunkFile::Bare(chunks) | ChunkFile::Wrapped { chunks } => chunks,
        };

        let mut store = Self::new(
            stored
                .into_iter()
                .map(|s| (s.chunk, s.embedding))
                .collect(),
            dimension,
        )?;
        store.label = format!("memory:{}", path.display());
        tracing::info!(path = %path.display(), chunks = store.len(), "loaded knowledge chunks");
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn lexical_ranking(&self, text: &str, pool: usize) -> Vec<String> {
        let query_terms: HashSet<String> = index_terms(text).into_iter().collect();
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, usize, &str)> = self
            .chunks
            .iter()
            .filter_map(|c| {
                let matched: Vec<usize> = query_terms
                    .iter()
                    .filter_map(|t| c.term_counts.get(t).copied())
                    .collect();
                if matched.is_empty() {
                    None
                } else {
                    Some((matched.len(), matched.iter().sum(), c.chunk.id.as_str()))
                }
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(b.2)));
        scored
            .into_iter()
            .take(pool)
            .map(|(_, _, id)| id.to_string())
            .collect()
    }

    fn semantic_ranking(&self, embedding: &[f32], pool: usize) -> Vec<String> {
        let mut scored: Vec<(f32, &str)> = self
            .chunks
            .iter()
            .map(|c| (cosine_similarity(embedding, &c.embedding), c.chunk.id.as_str()))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(b.1)));
        scored
            .into_iter()
            .take(pool)
            .map(|(_, id)| id.to_string())
            .collect()
    }
}

fn searchable_text(chunk: &KnowledgeChunk) -> String {
    format!(
        "{} {} {}",
        chunk.section,
        chunk.topics.join(" "),
        chunk.content
    )
}

fn index_terms(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn hybrid_search(&self, query: &HybridQuery) -> Result<Vec<KnowledgeChunk>> {
        if query.top_k == 0 {
            return Ok(Vec::new());
        }
        // Each side contributes up to twice the requested count before fusion.
        let pool = query.top_k * 2;
        let lexical = self.lexical_ranking(&query.text, pool);
        let semantic = self.semantic_ranking(&query.embedding, pool);

        let fused = fuse_rrf(
            &[
                RankedList {
                    ids: &lexical,
                    weight: query.full_text_weight,
                },
                RankedList {
                    ids: &semantic,
                    weight: query.semantic_weight,
                },
            ],
            query.rrf_k,
        );

        let by_id: HashMap<&str, &KnowledgeChunk> = self
            .chunks
            .iter()
            .map(|c| (c.chunk.id.as_str(), &c.chunk))
            .collect();

        Ok(fused
            .into_iter()
            .take(query.top_k)
            .filter_map(|(id, _)| by_id.get(id.as_str()).map(|c| (*c).clone()))
            .collect())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn chunk(id: &str, section: &str, content: &str) -> (KnowledgeChunk, Option<Vec<f32>>) {
        (
            KnowledgeChunk {
                id: id.to_string(),
                source: "Rulebook".to_string(),
                section: section.to_string(),
                content: content.to_string(),
                topics: Vec::new(),
            },
            None,
        )
    }

    fn store() -> InMemoryKnowledgeStore {
        InMemoryKnowledgeStore::new(
            vec![
                chunk("stations-01", "Stations", "The sled push covers 50m in four 12.5m lengths."),
                chunk("stations-02", "Stations", "The sled pull covers 50m; athletes pull hand over hand."),
                chunk("nutrition-01", "Nutrition", "Aim for 60-90g carbohydrate per hour in long sessions."),
                chunk("recovery-01", "Recovery", "Sleep seven to nine hours to recover from hard blocks."),
            ],
            128,
        )
        .unwrap()
    }

    fn query(text: &str, top_k: usize) -> HybridQuery {
        let hasher = HashingEmbeddings::new(128).unwrap();
        HybridQuery {
            text: text.to_string(),
            embedding: hasher.embed_text(text),
            top_k,
            full_text_weight: 1.0,
            semantic_weight: 1.0,
            rrf_k: 50,
        }
    }

    #[tokio::test]
    async fn test_relevant_chunk_ranks_first() {
        let results = store()
            .hybrid_search(&query("How long is the sled push?", 2))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "stations-01");
    }

    #[tokio::test]
    async fn test_search_is_deterministic() {
        let store = store();
        let q = query("carbohydrate per hour during racing", 3);
        let first = store.hybrid_search(&q).await.unwrap();
        let second = store.hybrid_search(&q).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].id, "nutrition-01");
    }

    #[tokio::test]
    async fn test_no_match_returns_empty() {
        let mut q = query("zzzz qqqq", 3);
        q.embedding = vec![0.0; 128];
        let results = store().hybrid_search(&q).await.unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = InMemoryKnowledgeStore::new(
            vec![chunk("dup", "a", "x"), chunk("dup", "b", "y")],
            16,
        );
        assert!(matches!(result, Err(EvalError::Library(_))));
    }

    #[test]
    fn test_wrong_embedding_dimension_rejected() {
        let (c, _) = chunk("c1", "s", "text");
        let result = InMemoryKnowledgeStore::new(vec![(c, Some(vec![1.0, 0.0]))], 16);
        assert!(matches!(result, Err(EvalError::Configuration(_))));
    }

    #[test]
    fn test_from_file_accepts_both_layouts() {
        let mut bare = tempfile::NamedTempFile::new().unwrap();
        write!(bare, r#"[{{"id":"a","content":"sled push"}}]"#).unwrap();
        let store = InMemoryKnowledgeStore::from_file(bare.path(), 16).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.describe().starts_with("memory:"));

        let mut wrapped = tempfile::NamedTempFile::new().unwrap();
        write!(
            wrapped,
            r#"{{"chunks":[{{"id":"a","content":"x"}},{{"id":"b","content":"y","embedding":[1.0,0.0]}}]}}"#
        )
        .unwrap();
        let store = InMemoryKnowledgeStore::from_file(wrapped.path(), 2).unwrap();
        assert_eq!(store.len(), 2);
    }
}
