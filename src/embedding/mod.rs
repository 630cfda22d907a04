//! Embedding generation for semantic retrieval.

mod openai;

pub use openai::OpenAiEmbedder;

use crate::error::Result;
use async_trait::async_trait;

/// An embedding with its token accounting.
#[derive(Debug, Clone)]
pub struct Embedding {
    /// Fixed-dimension vector.
    pub vector: Vec<f32>,
    /// Tokens consumed by the provider call.
    pub tokens_used: u32,
}

/// Trait for embedding generation.
///
/// An unavailable embedder is a graceful-degradation signal: callers fall
/// back to lexical-only retrieval instead of failing the request.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Whether a provider credential is configured.
    fn is_available(&self) -> bool;

    /// The embedding dimensions.
    fn dimensions(&self) -> usize;
}
