//! Generation model abstraction.
//!
//! The engine talks to chat models through [`LlmClient`]; [`FallbackChain`]
//! layers the primary/fallback ordering on top so the conversation manager
//! never needs to know which concrete provider answered.

mod openai;

pub use openai::OpenAiChat;

use crate::error::{ReferatError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Role of a prior conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

/// One prior turn of conversational history.
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub role: TurnRole,
    pub content: String,
}

/// A successful generation.
#[derive(Debug, Clone)]
pub struct Generation {
    /// Generated answer text.
    pub text: String,
    /// Identifier of the model that produced the answer.
    pub model: String,
    /// Tokens consumed by the call.
    pub tokens_used: u32,
}

/// Trait for generation model clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response to `user_message` given system instructions and
    /// prior history.
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[HistoryTurn],
        user_message: &str,
    ) -> Result<Generation>;

    /// Whether this client has a configured provider behind it.
    fn is_available(&self) -> bool;

    /// Identifier of the underlying model.
    fn model_id(&self) -> &str;
}

/// Primary/fallback generation ordering.
///
/// Tries the primary model; on any error retries once against the fallback
/// before surfacing the failure. Quota errors are propagated as-is so the
/// caller can show them to the user.
pub struct FallbackChain {
    primary: Option<Arc<dyn LlmClient>>,
    fallback: Option<Arc<dyn LlmClient>>,
}

impl FallbackChain {
    pub fn new(primary: Option<Arc<dyn LlmClient>>, fallback: Option<Arc<dyn LlmClient>>) -> Self {
        Self { primary, fallback }
    }

    /// The configured clients in the order they will be tried.
    fn candidates(&self) -> impl Iterator<Item = &Arc<dyn LlmClient>> {
        self.primary
            .iter()
            .chain(self.fallback.iter())
            .filter(|c| c.is_available())
    }
}

#[async_trait]
impl LlmClient for FallbackChain {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[HistoryTurn],
        user_message: &str,
    ) -> Result<Generation> {
        let mut last_err: Option<ReferatError> = None;

        for client in self.candidates() {
            match client.generate(system_prompt, history, user_message).await {
                Ok(generation) => {
                    info!(model = %generation.model, "Generation succeeded");
                    return Ok(generation);
                }
                Err(e) => {
                    warn!(model = client.model_id(), "Generation failed: {}", e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or(ReferatError::NoProviderAvailable))
    }

    fn is_available(&self) -> bool {
        self.candidates().next().is_some()
    }

    fn model_id(&self) -> &str {
        self.primary
            .as_deref()
            .or(self.fallback.as_deref())
            .map(|c| c.model_id())
            .unwrap_or("none")
    }
}
