//! Embedding provider implementations for generating text embeddings.

pub mod factory;
pub mod providers;

pub use factory::EmbeddingProviderFactory;
pub use providers::{EmbeddingProvider, HashingEmbeddings, OpenAIEmbeddings, cosine_similarity};
