//! In-memory vector index implementation.
//!
//! Useful for testing and small datasets.

use super::{cosine_similarity, rank_results, Chunk, ScoredChunk, VectorIndex};
use crate::error::Result;
use crate::scope::ChunkScope;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory vector index.
///
/// Chunks are stored per meeting so replacing a generation is a single map
/// write, matching the atomic-swap contract.
pub struct MemoryVectorIndex {
    meetings: RwLock<HashMap<Uuid, Vec<Chunk>>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self {
            meetings: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn replace_meeting_chunks(&self, meeting_id: Uuid, chunks: &[Chunk]) -> Result<usize> {
        let mut meetings = self.meetings.write().unwrap();
        meetings.insert(meeting_id, chunks.to_vec());
        Ok(chunks.len())
    }

    async fn query_nearest(
        &self,
        scope: &ChunkScope,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        scope.validate()?;
        let meetings = self.meetings.read().unwrap();

        let mut results: Vec<ScoredChunk> = meetings
            .values()
            .flatten()
            .filter(|chunk| chunk.organization_id == scope.organization_id)
            .filter(|chunk| scope.meeting_id.is_none_or(|m| chunk.meeting_id == m))
            .map(|chunk| ScoredChunk {
                score: cosine_similarity(query_embedding, &chunk.embedding),
                chunk: chunk.clone(),
            })
            .collect();

        rank_results(&mut results, k);
        Ok(results)
    }

    async fn delete_meeting(&self, meeting_id: Uuid) -> Result<usize> {
        let mut meetings = self.meetings.write().unwrap();
        Ok(meetings.remove(&meeting_id).map_or(0, |chunks| chunks.len()))
    }

    async fn chunk_count(&self) -> Result<usize> {
        let meetings = self.meetings.read().unwrap();
        Ok(meetings.values().map(|chunks| chunks.len()).sum())
    }
}
