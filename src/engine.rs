//! Engine facade.
//!
//! Wires settings into concrete components and exposes the public surface:
//! indexing, retrieval and conversations. Embedding applications hold one
//! [`Engine`] and call it from their own transport layer.

use crate::chat::{
    ChatConfig, ChatMessage, ChatReply, ChatSession, ConversationManager, SqliteChatStore,
};
use crate::chunking::{ChunkingConfig, WordWindowChunker};
use crate::config::Settings;
use crate::embedding::{Embedder, OpenAiEmbedder};
use crate::error::Result;
use crate::indexer::{IndexOutcome, Indexer};
use crate::lexical::{DateRange, SqliteTextIndex};
use crate::llm::{FallbackChain, LlmClient, OpenAiChat};
use crate::retrieval::{HybridHit, HybridSearcher, RetrievalConfig, SemanticRetriever};
use crate::scope::ChunkScope;
use crate::transcript::TranscriptProvider;
use crate::vector_index::{ScoredChunk, SqliteVectorIndex, VectorIndex};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// The assembled engine.
pub struct Engine {
    settings: Settings,
    indexer: Indexer,
    retriever: Arc<SemanticRetriever>,
    hybrid: HybridSearcher,
    conversations: ConversationManager,
}

/// Externally provided storage and providers, for embedding the engine with
/// non-default backends or test doubles.
pub struct EngineComponents {
    pub transcripts: Arc<dyn TranscriptProvider>,
    pub embedder: Arc<dyn Embedder>,
    pub vector_index: Arc<dyn VectorIndex>,
    pub text_index: Arc<SqliteTextIndex>,
    pub chat_store: Arc<SqliteChatStore>,
    pub llm: Arc<dyn LlmClient>,
}

impl Engine {
    /// Assemble an engine from settings, opening the configured SQLite
    /// databases and the OpenAI-backed providers.
    #[instrument(skip_all)]
    pub fn new(settings: Settings, transcripts: Arc<dyn TranscriptProvider>) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        ));
        let vector_index: Arc<dyn VectorIndex> =
            Arc::new(SqliteVectorIndex::new(&settings.vector_db_path())?);
        let text_index = Arc::new(SqliteTextIndex::new(&settings.text_db_path())?);
        let chat_store = Arc::new(SqliteChatStore::new(&settings.chat_db_path())?);

        let primary: Arc<dyn LlmClient> = Arc::new(
            OpenAiChat::new(&settings.llm.primary_model).with_temperature(settings.llm.temperature),
        );
        let fallback: Option<Arc<dyn LlmClient>> = settings.llm.fallback_model.as_deref().map(|m| {
            Arc::new(OpenAiChat::new(m).with_temperature(settings.llm.temperature))
                as Arc<dyn LlmClient>
        });
        let llm: Arc<dyn LlmClient> = Arc::new(FallbackChain::new(Some(primary), fallback));

        let components = EngineComponents {
            transcripts,
            embedder,
            vector_index,
            text_index,
            chat_store,
            llm,
        };

        info!("Engine assembled from settings");
        Ok(Self::with_components(settings, components))
    }

    /// Assemble an engine from explicit components.
    pub fn with_components(settings: Settings, components: EngineComponents) -> Self {
        let chunker = WordWindowChunker::new(ChunkingConfig {
            chunk_tokens: settings.chunking.chunk_tokens,
            overlap_tokens: settings.chunking.overlap_tokens,
        });
        let retrieval_config = RetrievalConfig {
            meeting_threshold: settings.retrieval.meeting_threshold,
            hybrid_threshold: settings.retrieval.hybrid_threshold,
            default_limit: settings.retrieval.default_limit,
        };
        let chat_config = ChatConfig {
            max_history_messages: settings.chat.max_history_messages,
            max_context_chunks: settings.chat.max_context_chunks,
        };

        let retriever = Arc::new(SemanticRetriever::new(
            components.vector_index.clone(),
            components.embedder.clone(),
            retrieval_config,
        ));

        let indexer = Indexer::new(
            components.transcripts.clone(),
            chunker,
            components.embedder,
            components.vector_index,
            components.text_index.clone(),
        );

        let hybrid = HybridSearcher::new(retriever.clone(), components.text_index);

        let conversations = ConversationManager::new(
            components.chat_store,
            retriever.clone(),
            components.llm,
            components.transcripts,
            settings.prompts.clone(),
            chat_config,
        );

        Self {
            settings,
            indexer,
            retriever,
            hybrid,
            conversations,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Index (or re-index) a meeting's transcript.
    pub async fn index_meeting(&self, meeting_id: Uuid) -> Result<IndexOutcome> {
        self.indexer.index_meeting(meeting_id).await
    }

    /// Remove a meeting from retrieval.
    pub async fn remove_meeting(&self, meeting_id: Uuid) -> Result<usize> {
        self.indexer.remove_meeting(meeting_id).await
    }

    /// Scoped semantic search. A meeting-restricted scope uses the
    /// single-meeting threshold, an organization-wide one the hybrid
    /// threshold.
    pub async fn search_similar(
        &self,
        scope: &ChunkScope,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredChunk>> {
        let limit = limit.unwrap_or(self.retriever.config().default_limit);
        match scope.meeting_id {
            Some(meeting_id) => {
                self.retriever
                    .get_context_chunks(scope.organization_id, meeting_id, query, limit)
                    .await
            }
            None => {
                self.retriever
                    .cross_meeting_search(scope.organization_id, query, None, limit)
                    .await
            }
        }
    }

    /// Semantic search across an organization's meetings, optionally limited
    /// to a subset of meeting ids.
    pub async fn cross_meeting_search(
        &self,
        organization_id: Uuid,
        query: &str,
        meeting_ids: Option<&[Uuid]>,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredChunk>> {
        let limit = limit.unwrap_or(self.retriever.config().default_limit);
        self.retriever
            .cross_meeting_search(organization_id, query, meeting_ids, limit)
            .await
    }

    /// Hybrid semantic + lexical search across an organization's meetings.
    pub async fn hybrid_search(
        &self,
        organization_id: Uuid,
        query: &str,
        limit: Option<usize>,
        date_range: Option<DateRange>,
    ) -> Result<Vec<HybridHit>> {
        let limit = limit.unwrap_or(self.retriever.config().default_limit);
        let scope = ChunkScope::organization(organization_id);
        self.hybrid.search(query, &scope, limit, date_range).await
    }

    /// Start a conversation, optionally scoped to one meeting.
    pub async fn create_chat(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        meeting_id: Option<Uuid>,
        title: Option<String>,
    ) -> Result<ChatSession> {
        self.conversations
            .create_chat(organization_id, user_id, meeting_id, title)
            .await
    }

    /// Ask a question within a conversation.
    pub async fn send_message(
        &self,
        chat_id: Uuid,
        user_id: Uuid,
        organization_id: Uuid,
        message: &str,
    ) -> Result<ChatReply> {
        self.conversations
            .send_message(chat_id, user_id, organization_id, message)
            .await
    }

    /// Full message history of an owned conversation.
    pub async fn get_chat_history(&self, chat_id: Uuid, user_id: Uuid) -> Result<Vec<ChatMessage>> {
        self.conversations.get_chat_history(chat_id, user_id).await
    }

    /// A user's conversations, most recently active first.
    pub async fn get_user_chats(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<ChatSession>> {
        self.conversations
            .get_user_chats(organization_id, user_id)
            .await
    }

    /// Delete an owned conversation and its messages.
    pub async fn delete_chat(&self, chat_id: Uuid, user_id: Uuid) -> Result<()> {
        self.conversations.delete_chat(chat_id, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedding;
    use crate::error::ReferatError;
    use crate::llm::{Generation, HistoryTurn};
    use crate::transcript::{MeetingTranscript, TranscriptSegment};
    use crate::vector_index::MemoryVectorIndex;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StubTranscripts {
        transcripts: HashMap<Uuid, MeetingTranscript>,
    }

    #[async_trait]
    impl TranscriptProvider for StubTranscripts {
        async fn fetch(&self, meeting_id: Uuid) -> Result<MeetingTranscript> {
            self.transcripts
                .get(&meeting_id)
                .cloned()
                .ok_or_else(|| ReferatError::NotFound(format!("meeting {}", meeting_id)))
        }
    }

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding> {
            // crude deterministic direction so different topics separate
            let budget = text.matches("budget").count() as f32;
            let hiring = text.matches("hiring").count() as f32;
            let vector = if budget >= hiring {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            };
            Ok(Embedding {
                vector,
                tokens_used: 1,
            })
        }

        fn is_available(&self) -> bool {
            true
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    struct StubLlm;

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn generate(
            &self,
            _system_prompt: &str,
            _history: &[HistoryTurn],
            _user_message: &str,
        ) -> Result<Generation> {
            Ok(Generation {
                text: "The budget was approved.".to_string(),
                model: "stub".to_string(),
                tokens_used: 10,
            })
        }

        fn is_available(&self) -> bool {
            true
        }

        fn model_id(&self) -> &str {
            "stub"
        }
    }

    fn transcript(org: Uuid, meeting: Uuid, topic: &str) -> MeetingTranscript {
        let text = format!("we discussed the {} at length today", topic).repeat(20);
        MeetingTranscript {
            meeting_id: meeting,
            organization_id: org,
            title: format!("{} meeting", topic),
            full_text: text.clone(),
            segments: vec![TranscriptSegment::new(
                Some("Alice".to_string()),
                text,
                Some(0.0),
                Some(300.0),
            )],
            summary: Some(format!("Talked about the {}.", topic)),
            action_items: None,
        }
    }

    fn engine(meetings: Vec<MeetingTranscript>) -> Engine {
        let transcripts: HashMap<Uuid, MeetingTranscript> = meetings
            .into_iter()
            .map(|t| (t.meeting_id, t))
            .collect();

        Engine::with_components(
            Settings::default(),
            EngineComponents {
                transcripts: Arc::new(StubTranscripts { transcripts }),
                embedder: Arc::new(StubEmbedder),
                vector_index: Arc::new(MemoryVectorIndex::new()),
                text_index: Arc::new(SqliteTextIndex::in_memory().unwrap()),
                chat_store: Arc::new(SqliteChatStore::in_memory().unwrap()),
                llm: Arc::new(StubLlm),
            },
        )
    }

    #[tokio::test]
    async fn test_index_then_search_round_trip() {
        let org = Uuid::new_v4();
        let meeting = Uuid::new_v4();
        let engine = engine(vec![transcript(org, meeting, "budget")]);

        let outcome = engine.index_meeting(meeting).await.unwrap();
        assert!(outcome.chunks_indexed > 0);

        let results = engine
            .search_similar(&ChunkScope::meeting(org, meeting), "budget", None)
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].chunk.meeting_id, meeting);
    }

    #[tokio::test]
    async fn test_hybrid_search_spans_meetings() {
        let org = Uuid::new_v4();
        let budget = Uuid::new_v4();
        let hiring = Uuid::new_v4();
        let engine = engine(vec![
            transcript(org, budget, "budget"),
            transcript(org, hiring, "hiring"),
        ]);
        engine.index_meeting(budget).await.unwrap();
        engine.index_meeting(hiring).await.unwrap();

        let hits = engine
            .hybrid_search(org, "budget", None, None)
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].meeting_id, budget);
    }

    #[tokio::test]
    async fn test_remove_meeting_stops_retrieval() {
        let org = Uuid::new_v4();
        let meeting = Uuid::new_v4();
        let engine = engine(vec![transcript(org, meeting, "budget")]);
        engine.index_meeting(meeting).await.unwrap();

        engine.remove_meeting(meeting).await.unwrap();

        let results = engine
            .search_similar(&ChunkScope::meeting(org, meeting), "budget", None)
            .await
            .unwrap();
        assert!(results.is_empty());

        let hits = engine
            .hybrid_search(org, "budget", None, None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_full_conversation_flow() {
        let org = Uuid::new_v4();
        let user = Uuid::new_v4();
        let meeting = Uuid::new_v4();
        let engine = engine(vec![transcript(org, meeting, "budget")]);
        engine.index_meeting(meeting).await.unwrap();

        let session = engine
            .create_chat(org, user, Some(meeting), None)
            .await
            .unwrap();
        let reply = engine
            .send_message(session.id, user, org, "what happened to the budget?")
            .await
            .unwrap();
        assert!(!reply.message.content.is_empty());
        assert!(!reply.message.citations.is_empty());

        let history = engine.get_chat_history(session.id, user).await.unwrap();
        assert_eq!(history.len(), 2);

        engine.delete_chat(session.id, user).await.unwrap();
        assert!(engine.get_chat_history(session.id, user).await.is_err());
    }

    #[tokio::test]
    async fn test_prompt_override_reaches_generation() {
        use std::sync::Mutex as StdMutex;

        struct RecordingLlm {
            seen: StdMutex<Option<String>>,
        }

        #[async_trait]
        impl LlmClient for RecordingLlm {
            async fn generate(
                &self,
                system_prompt: &str,
                _history: &[HistoryTurn],
                _user_message: &str,
            ) -> Result<Generation> {
                *self.seen.lock().unwrap() = Some(system_prompt.to_string());
                Ok(Generation {
                    text: "Budsjettet ble godkjent.".to_string(),
                    model: "stub".to_string(),
                    tokens_used: 10,
                })
            }

            fn is_available(&self) -> bool {
                true
            }

            fn model_id(&self) -> &str {
                "stub"
            }
        }

        let org = Uuid::new_v4();
        let user = Uuid::new_v4();
        let meeting = Uuid::new_v4();

        let llm = Arc::new(RecordingLlm {
            seen: StdMutex::new(None),
        });
        let mut settings = Settings::default();
        settings.prompts.meeting_system = "Answer in Norwegian.".to_string();

        let engine = Engine::with_components(
            settings,
            EngineComponents {
                transcripts: Arc::new(StubTranscripts {
                    transcripts: HashMap::from([(meeting, transcript(org, meeting, "budget"))]),
                }),
                embedder: Arc::new(StubEmbedder),
                vector_index: Arc::new(MemoryVectorIndex::new()),
                text_index: Arc::new(SqliteTextIndex::in_memory().unwrap()),
                chat_store: Arc::new(SqliteChatStore::in_memory().unwrap()),
                llm: llm.clone(),
            },
        );
        engine.index_meeting(meeting).await.unwrap();

        let session = engine
            .create_chat(org, user, Some(meeting), None)
            .await
            .unwrap();
        engine
            .send_message(session.id, user, org, "what about the budget?")
            .await
            .unwrap();

        let seen = llm.seen.lock().unwrap().clone().unwrap();
        assert!(seen.starts_with("Answer in Norwegian."));
    }

    #[tokio::test]
    async fn test_tenant_isolation_through_the_facade() {
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        let meeting = Uuid::new_v4();
        let engine = engine(vec![transcript(org_a, meeting, "budget")]);
        engine.index_meeting(meeting).await.unwrap();

        let results = engine
            .cross_meeting_search(org_b, "budget", None, None)
            .await
            .unwrap();
        assert!(results.is_empty());

        let hits = engine.hybrid_search(org_b, "budget", None, None).await.unwrap();
        assert!(hits.is_empty());
    }
}
