//! Multi-turn conversations over meeting content.
//!
//! A chat session scopes a conversation to one meeting or to a whole
//! organization; each turn retrieves context, drives the generation model
//! and persists the exchange with citations.

mod followups;
mod manager;
mod store;

pub use followups::{FollowupStrategy, KeywordFollowups};
pub use manager::{ChatReply, ConversationManager};
pub use store::SqliteChatStore;

use crate::citation::Citation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            _ => Err(format!("Unknown message role: {}", s)),
        }
    }
}

/// A conversation scope owned by one user.
///
/// `meeting_id` is immutable once set; `None` means the conversation spans
/// all of the organization's meetings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub meeting_id: Option<Uuid>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One persisted turn of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    /// Citations backing an assistant turn; always empty for user turns.
    pub citations: Vec<Citation>,
    /// Model that produced an assistant turn.
    pub model: Option<String>,
    /// Tokens consumed producing this turn.
    pub tokens: u32,
    /// Generation latency in milliseconds.
    pub latency_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// A user turn.
    pub fn user(chat_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            role: MessageRole::User,
            content: content.into(),
            citations: Vec::new(),
            model: None,
            tokens: 0,
            latency_ms: 0,
            created_at: Utc::now(),
        }
    }

    /// An assistant turn with its generation metadata.
    pub fn assistant(
        chat_id: Uuid,
        content: impl Into<String>,
        citations: Vec<Citation>,
        model: String,
        tokens: u32,
        latency_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            role: MessageRole::Assistant,
            content: content.into(),
            citations,
            model: Some(model),
            tokens,
            latency_ms,
            created_at: Utc::now(),
        }
    }
}

/// Conversation bounds.
#[derive(Debug, Clone, Copy)]
pub struct ChatConfig {
    /// Maximum prior turns sent to the generation model.
    pub max_history_messages: usize,
    /// Context chunk budget per question.
    pub max_context_chunks: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_history_messages: 10,
            max_context_chunks: 8,
        }
    }
}
