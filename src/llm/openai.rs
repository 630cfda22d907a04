//! OpenAI chat completion client.

use super::{Generation, HistoryTurn, LlmClient, TurnRole};
use crate::error::{ReferatError, Result};
use crate::openai::{api_key_configured, create_client};
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// OpenAI-backed generation client for a single model.
pub struct OpenAiChat {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiChat {
    pub fn new(model: &str) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            temperature: 0.7,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn map_error(e: OpenAIError) -> ReferatError {
        if let OpenAIError::ApiError(api) = &e {
            let quota = api
                .code
                .as_deref()
                .is_some_and(|c| c.contains("insufficient_quota"))
                || api.message.contains("quota");
            if quota {
                return ReferatError::QuotaExceeded(api.message.clone());
            }
        }
        ReferatError::ProviderUnavailable(format!("Chat completion failed: {}", e))
    }
}

#[async_trait]
impl LlmClient for OpenAiChat {
    #[instrument(skip_all, fields(model = %self.model, history = history.len()))]
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[HistoryTurn],
        user_message: &str,
    ) -> Result<Generation> {
        if !self.is_available() {
            return Err(ReferatError::ProviderUnavailable(
                "no chat API key configured".to_string(),
            ));
        }

        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt.to_string())
                .build()
                .map_err(|e| ReferatError::Chat(e.to_string()))?
                .into(),
        ];

        for turn in history {
            let message: ChatCompletionRequestMessage = match turn.role {
                TurnRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content.clone())
                    .build()
                    .map_err(|e| ReferatError::Chat(e.to_string()))?
                    .into(),
                TurnRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content.clone())
                    .build()
                    .map_err(|e| ReferatError::Chat(e.to_string()))?
                    .into(),
            };
            messages.push(message);
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_message.to_string())
                .build()
                .map_err(|e| ReferatError::Chat(e.to_string()))?
                .into(),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| ReferatError::Chat(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(Self::map_error)?;

        let tokens_used = response.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0);

        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| {
                ReferatError::ProviderUnavailable("Empty response from model".to_string())
            })?;

        debug!("Generated {} chars ({} tokens)", text.len(), tokens_used);

        Ok(Generation {
            text,
            model: self.model.clone(),
            tokens_used,
        })
    }

    fn is_available(&self) -> bool {
        api_key_configured()
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
