//! Conversation management.
//!
//! Owns chat session state and drives one question/answer turn: retrieval,
//! context assembly, the generation call and persistence of both sides of
//! the exchange.

use super::{
    ChatConfig, ChatMessage, ChatSession, FollowupStrategy, KeywordFollowups, MessageRole,
    SqliteChatStore,
};
use crate::citation::build_citations;
use crate::config::Prompts;
use crate::error::{ReferatError, Result};
use crate::llm::{HistoryTurn, LlmClient, TurnRole};
use crate::retrieval::SemanticRetriever;
use crate::transcript::TranscriptProvider;
use crate::vector_index::ScoredChunk;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Default title until the first question names the session.
const DEFAULT_TITLE: &str = "New conversation";

/// Maximum title length derived from a question.
const MAX_TITLE_CHARS: usize = 80;

/// The outcome of one successful conversation turn.
#[derive(Debug, Clone)]
pub struct ChatReply {
    /// The persisted assistant message.
    pub message: ChatMessage,
    /// Advisory follow-up questions, at most three.
    pub suggested_followups: Vec<String>,
}

/// Conversation manager.
///
/// Writes within one session are serialized through a per-session lock;
/// different sessions and read-only queries proceed concurrently.
pub struct ConversationManager {
    store: Arc<SqliteChatStore>,
    retriever: Arc<SemanticRetriever>,
    llm: Arc<dyn LlmClient>,
    transcripts: Arc<dyn TranscriptProvider>,
    followups: Arc<dyn FollowupStrategy>,
    prompts: Prompts,
    config: ChatConfig,
    session_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ConversationManager {
    pub fn new(
        store: Arc<SqliteChatStore>,
        retriever: Arc<SemanticRetriever>,
        llm: Arc<dyn LlmClient>,
        transcripts: Arc<dyn TranscriptProvider>,
        prompts: Prompts,
        config: ChatConfig,
    ) -> Self {
        Self {
            store,
            retriever,
            llm,
            transcripts,
            followups: Arc::new(KeywordFollowups),
            prompts,
            config,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the follow-up suggestion strategy.
    pub fn with_followups(mut self, followups: Arc<dyn FollowupStrategy>) -> Self {
        self.followups = followups;
        self
    }

    /// Create a new chat session, optionally scoped to one meeting.
    #[instrument(skip(self))]
    pub async fn create_chat(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        meeting_id: Option<Uuid>,
        title: Option<String>,
    ) -> Result<ChatSession> {
        if organization_id.is_nil() || user_id.is_nil() {
            return Err(ReferatError::Validation(
                "organization and user ids must be non-nil".to_string(),
            ));
        }

        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        self.store
            .create_session(organization_id, user_id, meeting_id, title)
    }

    /// Answer one question within a session.
    ///
    /// The user message is persisted before anything can fail; a generation
    /// failure leaves it as a dangling unanswered turn and surfaces the
    /// error instead of fabricating an answer.
    #[instrument(skip(self, message), fields(chat_id = %chat_id))]
    pub async fn send_message(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        organization_id: Uuid,
        message: &str,
    ) -> Result<ChatReply> {
        if message.trim().is_empty() {
            return Err(ReferatError::Validation("message must not be empty".to_string()));
        }

        let lock = self.session_lock(chat_id).await;
        let _guard = lock.lock().await;

        // resolved under the lock so a concurrent delete cannot slip between
        // the ownership check and the first write
        let session = self.store.get_owned_session(chat_id, user_id)?;
        if session.organization_id != organization_id {
            return Err(ReferatError::NotFound(format!(
                "chat session {} not found",
                chat_id
            )));
        }

        let first_turn = self.store.message_count(chat_id)? == 0;
        self.store
            .append_message(&ChatMessage::user(chat_id, message))?;
        if first_turn && session.title == DEFAULT_TITLE {
            self.store.set_title(chat_id, &derive_title(message))?;
        }

        let context_chunks = self.retrieve_context(&session, message).await?;
        let summary = match session.meeting_id {
            Some(meeting_id) => self.meeting_summary(meeting_id).await,
            None => None,
        };
        let context = format_context(summary.as_deref(), &context_chunks);

        let system_prompt = format!(
            "{}\n\nContext:\n{}",
            self.prompts.system_for_scope(session.meeting_id.is_some()),
            context
        );

        let history = self.history_window(chat_id)?;

        let started = Instant::now();
        let generation = self
            .llm
            .generate(&system_prompt, &history, message)
            .await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let citations = build_citations(&context_chunks);
        let assistant = ChatMessage::assistant(
            chat_id,
            generation.text.clone(),
            citations,
            generation.model,
            generation.tokens_used,
            latency_ms,
        );
        self.store.append_message(&assistant)?;
        self.store.touch_session(chat_id)?;

        let suggested_followups = self.followups.suggest(message, &generation.text);

        info!(
            "Answered in {} ms with {} citations",
            latency_ms,
            assistant.citations.len()
        );

        Ok(ChatReply {
            message: assistant,
            suggested_followups,
        })
    }

    /// All messages of an owned session, oldest-first.
    pub async fn get_chat_history(&self, chat_id: Uuid, user_id: Uuid) -> Result<Vec<ChatMessage>> {
        self.store.get_owned_session(chat_id, user_id)?;
        self.store.all_messages(chat_id)
    }

    /// All sessions of a user, most recently updated first.
    pub async fn get_user_chats(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<ChatSession>> {
        self.store.list_sessions(organization_id, user_id)
    }

    /// Delete an owned session together with all its messages.
    #[instrument(skip(self))]
    pub async fn delete_chat(&self, chat_id: Uuid, user_id: Uuid) -> Result<()> {
        let lock = self.session_lock(chat_id).await;
        let _guard = lock.lock().await;

        self.store.get_owned_session(chat_id, user_id)?;
        self.store.delete_session(chat_id)?;
        self.session_locks.lock().await.remove(&chat_id);
        Ok(())
    }

    /// Context chunks for the session's scope.
    async fn retrieve_context(
        &self,
        session: &ChatSession,
        message: &str,
    ) -> Result<Vec<ScoredChunk>> {
        match session.meeting_id {
            Some(meeting_id) => {
                self.retriever
                    .get_context_chunks(
                        session.organization_id,
                        meeting_id,
                        message,
                        self.config.max_context_chunks,
                    )
                    .await
            }
            None => {
                self.retriever
                    .cross_meeting_search(
                        session.organization_id,
                        message,
                        None,
                        self.config.max_context_chunks,
                    )
                    .await
            }
        }
    }

    /// The meeting summary, if the provider has one. Failures degrade to no
    /// summary block.
    async fn meeting_summary(&self, meeting_id: Uuid) -> Option<String> {
        match self.transcripts.fetch(meeting_id).await {
            Ok(transcript) => transcript.summary,
            Err(e) => {
                warn!("Could not fetch meeting summary: {}", e);
                None
            }
        }
    }

    /// The last `max_history_messages` turns before the just-persisted user
    /// message, oldest-first.
    fn history_window(&self, chat_id: Uuid) -> Result<Vec<HistoryTurn>> {
        let mut recent = self
            .store
            .recent_messages(chat_id, self.config.max_history_messages + 1)?;
        recent.pop(); // the new user message is sent separately

        debug!("History window of {} turns", recent.len());
        Ok(recent
            .into_iter()
            .map(|m| HistoryTurn {
                role: match m.role {
                    MessageRole::User => TurnRole::User,
                    MessageRole::Assistant => TurnRole::Assistant,
                },
                content: m.content,
            })
            .collect())
    }

    async fn session_lock(&self, chat_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        locks.entry(chat_id).or_default().clone()
    }
}

/// Derive a session title from the first question.
fn derive_title(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.chars().count() <= MAX_TITLE_CHARS {
        return trimmed.to_string();
    }
    let truncated: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
    format!("{}…", truncated.trim_end())
}

/// Assemble the context string: optional summary block, then one block per
/// retrieved chunk with meeting title, timestamp, leading speaker and text.
fn format_context(summary: Option<&str>, chunks: &[ScoredChunk]) -> String {
    let mut blocks: Vec<String> = Vec::new();

    if let Some(summary) = summary {
        blocks.push(format!("Meeting summary:\n{}", summary));
    }

    for (i, result) in chunks.iter().enumerate() {
        let timestamp = result
            .chunk
            .format_timestamp()
            .unwrap_or_else(|| "--:--".to_string());
        let speaker = result
            .chunk
            .speakers
            .first()
            .map(|s| format!(" ({})", s))
            .unwrap_or_default();

        blocks.push(format!(
            "---\n[{}] {} @ {}{}\n{}\n---",
            i + 1,
            result.chunk.meeting_title,
            timestamp,
            speaker,
            result.chunk.text
        ));
    }

    if blocks.is_empty() {
        "(no relevant meeting content found)".to_string()
    } else {
        blocks.join("\n\n")
    }
}
