//! OpenAI embeddings implementation.

use super::{Embedder, Embedding};
use crate::error::{ReferatError, Result};
use crate::openai::{api_key_configured, create_client};
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Maximum input size in bytes accepted before deterministic truncation.
/// Roughly 8k tokens at 4 bytes/token, the limit of the small models.
const MAX_INPUT_BYTES: usize = 32_000;

/// OpenAI-based embedder.
pub struct OpenAiEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    /// Create a new OpenAI embedder with default settings.
    pub fn new() -> Self {
        Self::with_config("text-embedding-3-small", 1536)
    }

    /// Create a new OpenAI embedder with custom model and dimensions.
    pub fn with_config(model: &str, dimensions: usize) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            dimensions,
        }
    }
}

impl Default for OpenAiEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncate to the byte budget at a char boundary.
fn truncate_input(text: &str) -> &str {
    if text.len() <= MAX_INPUT_BYTES {
        return text;
    }
    let mut end = MAX_INPUT_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    #[instrument(skip(self, text), fields(len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Embedding> {
        if !self.is_available() {
            return Err(ReferatError::ProviderUnavailable(
                "no embedding API key configured".to_string(),
            ));
        }

        let input = truncate_input(text);

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(input.to_string()))
            .dimensions(self.dimensions as u32)
            .build()
            .map_err(|e| ReferatError::Embedding(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| ReferatError::Embedding(format!("Embedding API error: {}", e)))?;

        let tokens_used = response.usage.total_tokens;
        let vector = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ReferatError::Embedding("Empty embedding response".to_string()))?;

        if vector.len() != self.dimensions {
            return Err(ReferatError::Embedding(format!(
                "Expected {} dimensions, got {}",
                self.dimensions,
                vector.len()
            )));
        }

        debug!("Generated embedding ({} tokens)", tokens_used);
        Ok(Embedding {
            vector,
            tokens_used,
        })
    }

    fn is_available(&self) -> bool {
        api_key_configured()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_creation() {
        let embedder = OpenAiEmbedder::new();
        assert_eq!(embedder.dimensions(), 1536);

        let embedder = OpenAiEmbedder::with_config("text-embedding-3-large", 3072);
        assert_eq!(embedder.dimensions(), 3072);
    }

    #[test]
    fn test_truncation_is_deterministic_and_char_safe() {
        let long = "å".repeat(MAX_INPUT_BYTES); // 2 bytes per char
        let a = truncate_input(&long);
        let b = truncate_input(&long);
        assert_eq!(a, b);
        assert!(a.len() <= MAX_INPUT_BYTES);
        assert!(a.is_char_boundary(a.len()));

        let short = "fits as is";
        assert_eq!(truncate_input(short), short);
    }
}
