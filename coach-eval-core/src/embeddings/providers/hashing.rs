//! Deterministic feature-hashing embedder (no network)

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::EmbeddingProvider;
use crate::error::{EvalError, Result};

/// Signed feature hashing over lowercase word unigrams and bigrams,
/// L2-normalized. Identical text always yields the identical vector.
pub struct HashingEmbeddings {
    dimension: usize,
    model: String,
}

impl HashingEmbeddings {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(EvalError::Configuration(
                "hashing embedder needs a positive dimension".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            model: format!("hashing-{}", dimension),
        })
    }

    /// Embed synchronously; used by the in-memory knowledge store at load time
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let tokens = tokenize(text);
        let mut vector = vec![0.0f32; self.dimension];

        let bigrams = tokens.windows(2).map(|w| format!("{} {}", w[0], w[1]));
        for feature in tokens.iter().cloned().chain(bigrams) {
            let digest = Sha256::digest(feature.as_bytes());
            let mut index_bytes = [0u8; 8];
            index_bytes.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(index_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

/// Lowercase alphanumeric tokens
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
