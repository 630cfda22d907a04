//! Meeting indexing pipeline.
//!
//! Fetches a finished transcript, chunks it, embeds the chunks and swaps
//! them into the vector index as one generation, then refreshes the lexical
//! index. Re-running the pipeline for a meeting converges to the same final
//! state.

use crate::chunking::{SegmentChunk, WordWindowChunker};
use crate::embedding::Embedder;
use crate::error::{ReferatError, Result};
use crate::lexical::{MeetingRecord, SqliteTextIndex};
use crate::transcript::{MeetingTranscript, TranscriptProvider};
use crate::vector_index::{Chunk, VectorIndex};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Result of indexing one meeting.
#[derive(Debug, Clone, Copy)]
pub struct IndexOutcome {
    /// Chunks embedded and stored.
    pub chunks_indexed: usize,
    /// Chunks skipped because their embedding failed.
    pub chunks_failed: usize,
}

/// Drives the transcript → chunks → embeddings → index pipeline.
pub struct Indexer {
    transcripts: Arc<dyn TranscriptProvider>,
    chunker: WordWindowChunker,
    embedder: Arc<dyn Embedder>,
    vector_index: Arc<dyn VectorIndex>,
    text_index: Arc<SqliteTextIndex>,
}

impl Indexer {
    pub fn new(
        transcripts: Arc<dyn TranscriptProvider>,
        chunker: WordWindowChunker,
        embedder: Arc<dyn Embedder>,
        vector_index: Arc<dyn VectorIndex>,
        text_index: Arc<SqliteTextIndex>,
    ) -> Self {
        Self {
            transcripts,
            chunker,
            embedder,
            vector_index,
            text_index,
        }
    }

    /// Index (or re-index) one meeting.
    ///
    /// The vector index is replaced atomically; a chunk whose embedding
    /// fails is skipped with a warning rather than failing the whole run.
    /// An unconfigured embedder is an error: nothing would be indexed.
    #[instrument(skip(self), fields(meeting_id = %meeting_id))]
    pub async fn index_meeting(&self, meeting_id: Uuid) -> Result<IndexOutcome> {
        if !self.embedder.is_available() {
            return Err(ReferatError::Embedding(
                "embedding provider is not configured".to_string(),
            ));
        }

        let transcript = self.transcripts.fetch(meeting_id).await?;
        let segment_chunks = self.chunk_transcript(&transcript);

        if segment_chunks.is_empty() {
            // an empty transcript still clears any stale generation
            self.vector_index.delete_meeting(meeting_id).await?;
            self.text_index.upsert_meeting(&record_for(&transcript))?;
            info!("Meeting transcript is empty, cleared existing chunks");
            return Ok(IndexOutcome {
                chunks_indexed: 0,
                chunks_failed: 0,
            });
        }

        let embeddings = join_all(
            segment_chunks
                .iter()
                .map(|chunk| self.embedder.embed(&chunk.text)),
        )
        .await;

        let mut chunks = Vec::with_capacity(segment_chunks.len());
        let mut failed = 0usize;
        for (i, (segment_chunk, embedding)) in
            segment_chunks.into_iter().zip(embeddings).enumerate()
        {
            match embedding {
                Ok(embedding) => chunks.push(Chunk::new(
                    transcript.meeting_id,
                    transcript.organization_id,
                    transcript.title.clone(),
                    i as i32,
                    segment_chunk.text,
                    segment_chunk.start_time,
                    segment_chunk.end_time,
                    segment_chunk.speakers,
                    embedding.vector,
                )),
                Err(e) => {
                    warn!("Embedding chunk {} failed, skipping it: {}", i, e);
                    failed += 1;
                }
            }
        }

        let stored = self
            .vector_index
            .replace_meeting_chunks(meeting_id, &chunks)
            .await?;
        self.text_index.upsert_meeting(&record_for(&transcript))?;

        info!("Indexed {} chunks ({} failed)", stored, failed);
        Ok(IndexOutcome {
            chunks_indexed: stored,
            chunks_failed: failed,
        })
    }

    /// Remove a meeting from both indexes.
    #[instrument(skip(self))]
    pub async fn remove_meeting(&self, meeting_id: Uuid) -> Result<usize> {
        let removed = self.vector_index.delete_meeting(meeting_id).await?;
        self.text_index.mark_deleted(meeting_id)?;
        info!("Removed {} chunks for meeting {}", removed, meeting_id);
        Ok(removed)
    }

    /// Chunk timed segments when the transcript has them, otherwise fall
    /// back to the plain full text.
    fn chunk_transcript(&self, transcript: &MeetingTranscript) -> Vec<SegmentChunk> {
        if transcript.segments.is_empty() {
            self.chunker
                .chunk_text(&transcript.full_text)
                .into_iter()
                .map(|text| SegmentChunk {
                    text,
                    start_time: None,
                    end_time: None,
                    speakers: Vec::new(),
                })
                .collect()
        } else {
            self.chunker.chunk_segments(&transcript.segments)
        }
    }
}

fn record_for(transcript: &MeetingTranscript) -> MeetingRecord {
    MeetingRecord {
        meeting_id: transcript.meeting_id,
        organization_id: transcript.organization_id,
        title: transcript.title.clone(),
        transcript: transcript.full_text.clone(),
        summary: transcript.summary.clone(),
        action_items: transcript.action_items.clone(),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkingConfig;
    use crate::embedding::Embedding;
    use crate::lexical::TextSearch;
    use crate::scope::ChunkScope;
    use crate::transcript::TranscriptSegment;
    use crate::vector_index::MemoryVectorIndex;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubTranscripts {
        transcript: MeetingTranscript,
    }

    #[async_trait]
    impl TranscriptProvider for StubTranscripts {
        async fn fetch(&self, _meeting_id: Uuid) -> Result<MeetingTranscript> {
            Ok(self.transcript.clone())
        }
    }

    /// Embedder double that can fail on selected calls.
    struct StubEmbedder {
        available: bool,
        fail_every: Option<usize>,
        calls: AtomicUsize,
    }

    impl StubEmbedder {
        fn ok() -> Self {
            Self {
                available: true,
                fail_every: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing_every(n: usize) -> Self {
            Self {
                available: true,
                fail_every: Some(n),
                calls: AtomicUsize::new(0),
            }
        }

        fn unavailable() -> Self {
            Self {
                available: false,
                fail_every: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Embedding> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_every.is_some_and(|n| (call + 1) % n == 0) {
                return Err(ReferatError::Embedding("transient failure".to_string()));
            }
            Ok(Embedding {
                vector: vec![1.0, 0.0],
                tokens_used: 1,
            })
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    fn transcript(org: Uuid, meeting: Uuid, words: usize) -> MeetingTranscript {
        let text = (0..words)
            .map(|i| format!("w{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        MeetingTranscript {
            meeting_id: meeting,
            organization_id: org,
            title: "Sprint review".to_string(),
            full_text: text.clone(),
            segments: vec![TranscriptSegment::new(
                Some("Alice".to_string()),
                text,
                Some(0.0),
                Some(60.0),
            )],
            summary: Some("Reviewed the sprint.".to_string()),
            action_items: Some("Ship the release".to_string()),
        }
    }

    fn indexer(
        transcript: MeetingTranscript,
        embedder: Arc<StubEmbedder>,
    ) -> (Indexer, Arc<MemoryVectorIndex>, Arc<SqliteTextIndex>) {
        let vector_index = Arc::new(MemoryVectorIndex::new());
        let text_index = Arc::new(SqliteTextIndex::in_memory().unwrap());
        let indexer = Indexer::new(
            Arc::new(StubTranscripts { transcript }),
            WordWindowChunker::new(ChunkingConfig {
                chunk_tokens: 40, // 30-word windows
                overlap_tokens: 8,
            }),
            embedder,
            vector_index.clone(),
            text_index.clone(),
        );
        (indexer, vector_index, text_index)
    }

    #[tokio::test]
    async fn test_index_meeting_populates_both_indexes() {
        let org = Uuid::new_v4();
        let meeting = Uuid::new_v4();
        let (indexer, vector_index, text_index) =
            indexer(transcript(org, meeting, 100), Arc::new(StubEmbedder::ok()));

        let outcome = indexer.index_meeting(meeting).await.unwrap();
        assert!(outcome.chunks_indexed > 1);
        assert_eq!(outcome.chunks_failed, 0);
        assert_eq!(vector_index.chunk_count().await.unwrap(), outcome.chunks_indexed);

        let hits = text_index
            .search_text("sprint", &ChunkScope::organization(org), None)
            .await
            .unwrap();
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn test_reindexing_is_idempotent() {
        let org = Uuid::new_v4();
        let meeting = Uuid::new_v4();
        let (indexer, vector_index, _) =
            indexer(transcript(org, meeting, 100), Arc::new(StubEmbedder::ok()));

        let first = indexer.index_meeting(meeting).await.unwrap();
        let second = indexer.index_meeting(meeting).await.unwrap();

        assert_eq!(first.chunks_indexed, second.chunks_indexed);
        assert_eq!(
            vector_index.chunk_count().await.unwrap(),
            second.chunks_indexed
        );
    }

    #[tokio::test]
    async fn test_failed_chunk_embeddings_are_skipped() {
        let org = Uuid::new_v4();
        let meeting = Uuid::new_v4();
        // 100 words in 30-word windows with 6-word overlap yield 4+ chunks
        let (indexer, vector_index, _) = indexer(
            transcript(org, meeting, 100),
            Arc::new(StubEmbedder::failing_every(2)),
        );

        let outcome = indexer.index_meeting(meeting).await.unwrap();
        assert!(outcome.chunks_failed > 0);
        assert!(outcome.chunks_indexed > 0);
        assert_eq!(
            vector_index.chunk_count().await.unwrap(),
            outcome.chunks_indexed
        );
    }

    #[tokio::test]
    async fn test_unavailable_embedder_is_an_error() {
        let org = Uuid::new_v4();
        let meeting = Uuid::new_v4();
        let (indexer, vector_index, _) = indexer(
            transcript(org, meeting, 100),
            Arc::new(StubEmbedder::unavailable()),
        );

        let err = indexer.index_meeting(meeting).await.unwrap_err();
        assert!(matches!(err, ReferatError::Embedding(_)));
        assert_eq!(vector_index.chunk_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_transcript_clears_previous_generation() {
        let org = Uuid::new_v4();
        let meeting = Uuid::new_v4();
        let (indexer, vector_index, _) =
            indexer(transcript(org, meeting, 100), Arc::new(StubEmbedder::ok()));
        indexer.index_meeting(meeting).await.unwrap();
        assert!(vector_index.chunk_count().await.unwrap() > 0);

        let mut empty = transcript(org, meeting, 0);
        empty.full_text = String::new();
        empty.segments = vec![];
        let (indexer, _, _) = {
            let text_index = Arc::new(SqliteTextIndex::in_memory().unwrap());
            (
                Indexer::new(
                    Arc::new(StubTranscripts { transcript: empty }),
                    WordWindowChunker::default(),
                    Arc::new(StubEmbedder::ok()),
                    vector_index.clone(),
                    text_index.clone(),
                ),
                vector_index.clone(),
                text_index,
            )
        };

        let outcome = indexer.index_meeting(meeting).await.unwrap();
        assert_eq!(outcome.chunks_indexed, 0);
        assert_eq!(vector_index.chunk_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_meeting_clears_both_indexes() {
        let org = Uuid::new_v4();
        let meeting = Uuid::new_v4();
        let (indexer, vector_index, text_index) =
            indexer(transcript(org, meeting, 100), Arc::new(StubEmbedder::ok()));
        indexer.index_meeting(meeting).await.unwrap();

        let removed = indexer.remove_meeting(meeting).await.unwrap();
        assert!(removed > 0);
        assert_eq!(vector_index.chunk_count().await.unwrap(), 0);

        let hits = text_index
            .search_text("sprint", &ChunkScope::organization(org), None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_chunk_indexes_are_monotonic() {
        let org = Uuid::new_v4();
        let meeting = Uuid::new_v4();
        let (indexer, vector_index, _) =
            indexer(transcript(org, meeting, 100), Arc::new(StubEmbedder::ok()));
        indexer.index_meeting(meeting).await.unwrap();

        let results = vector_index
            .query_nearest(&ChunkScope::meeting(org, meeting), &[1.0, 0.0], 100)
            .await
            .unwrap();
        let mut indexes: Vec<i32> = results.iter().map(|r| r.chunk.chunk_index).collect();
        indexes.sort_unstable();
        for pair in indexes.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }
}
