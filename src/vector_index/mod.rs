//! Vector index abstraction.
//!
//! Tenant/meeting-scoped storage of chunk embeddings with nearest-neighbor
//! cosine queries. Backends implement [`VectorIndex`]; retrieval logic never
//! sees the storage engine.

mod memory;
mod sqlite;

pub use memory::MemoryVectorIndex;
pub use sqlite::SqliteVectorIndex;

use crate::scope::ChunkScope;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A retrievable chunk of transcript text with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID.
    pub id: Uuid,
    /// Meeting this chunk belongs to.
    pub meeting_id: Uuid,
    /// Owning organization.
    pub organization_id: Uuid,
    /// Meeting title, denormalized for citations.
    pub meeting_title: String,
    /// Monotonic position within the meeting's chunk sequence.
    pub chunk_index: i32,
    /// Chunk text.
    pub text: String,
    /// Start time in seconds, when the transcript carried timing.
    pub start_time: Option<f64>,
    /// End time in seconds.
    pub end_time: Option<f64>,
    /// Distinct speakers in order of first appearance.
    pub speakers: Vec<String>,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this chunk generation was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl Chunk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        meeting_id: Uuid,
        organization_id: Uuid,
        meeting_title: String,
        chunk_index: i32,
        text: String,
        start_time: Option<f64>,
        end_time: Option<f64>,
        speakers: Vec<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            meeting_id,
            organization_id,
            meeting_title,
            chunk_index,
            text,
            start_time,
            end_time,
            speakers,
            embedding,
            indexed_at: Utc::now(),
        }
    }

    /// Format the chunk's start time for display, e.g. "02:05" or "01:02:05".
    pub fn format_timestamp(&self) -> Option<String> {
        let start = self.start_time?;
        let total_seconds = start.max(0.0) as u32;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let secs = total_seconds % 60;

        Some(if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, secs)
        } else {
            format!("{:02}:{:02}", minutes, secs)
        })
    }
}

/// A chunk with its similarity score against a query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity, higher is better.
    pub score: f32,
}

/// Trait for vector index implementations.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Atomically replace all chunks for a meeting with a new generation.
    ///
    /// Idempotent: re-running with the same chunk set leaves the same final
    /// state. Concurrent readers see either the old generation or the new
    /// one, never a mix. Returns the number of chunks stored.
    async fn replace_meeting_chunks(&self, meeting_id: Uuid, chunks: &[Chunk]) -> Result<usize>;

    /// Nearest-neighbor query within a scope.
    ///
    /// Results are sorted by similarity descending; ties break by
    /// `chunk_index` ascending for determinism.
    async fn query_nearest(
        &self,
        scope: &ChunkScope,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>>;

    /// Delete all chunks for a meeting. Returns the number removed.
    async fn delete_meeting(&self, meeting_id: Uuid) -> Result<usize>;

    /// Total chunk count across all tenants.
    async fn chunk_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Rank scored chunks: score descending, then chunk index ascending.
pub(crate) fn rank_results(results: &mut Vec<ScoredChunk>, k: usize) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
    });
    results.truncate(k);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_mismatched_lengths_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_chunk_timestamp_format() {
        let mut chunk = Chunk::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Weekly sync".to_string(),
            0,
            "content".to_string(),
            Some(125.0),
            Some(130.0),
            vec![],
            vec![],
        );
        assert_eq!(chunk.format_timestamp().as_deref(), Some("02:05"));

        chunk.start_time = Some(3725.0);
        assert_eq!(chunk.format_timestamp().as_deref(), Some("01:02:05"));

        chunk.start_time = None;
        assert_eq!(chunk.format_timestamp(), None);
    }

    #[test]
    fn test_rank_results_tie_break_by_index() {
        let org = Uuid::new_v4();
        let meeting = Uuid::new_v4();
        let make = |idx: i32, score: f32| ScoredChunk {
            chunk: Chunk::new(
                meeting,
                org,
                "m".to_string(),
                idx,
                "t".to_string(),
                None,
                None,
                vec![],
                vec![],
            ),
            score,
        };

        let mut results = vec![make(5, 0.8), make(1, 0.8), make(2, 0.9)];
        rank_results(&mut results, 10);
        assert_eq!(results[0].chunk.chunk_index, 2);
        assert_eq!(results[1].chunk.chunk_index, 1);
        assert_eq!(results[2].chunk.chunk_index, 5);
    }
}
