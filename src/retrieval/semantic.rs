//! Semantic retrieval over chunk embeddings.

use super::RetrievalConfig;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::scope::ChunkScope;
use crate::vector_index::{ScoredChunk, VectorIndex};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Embeds queries and retrieves the nearest chunks within a scope.
///
/// Retrieval-path failures degrade: an unavailable embedder or a failing
/// index read yields an empty result set, never an error. Only malformed
/// scopes are rejected.
pub struct SemanticRetriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl SemanticRetriever {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Top-`limit` chunks above `threshold`, sorted by similarity descending.
    #[instrument(skip(self), fields(query = %query))]
    pub async fn search_similar(
        &self,
        query: &str,
        scope: &ChunkScope,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredChunk>> {
        scope.validate()?;

        if !self.embedder.is_available() {
            debug!("Embedder unavailable, semantic retrieval degrades to empty");
            return Ok(Vec::new());
        }

        let embedding = match self.embedder.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Query embedding failed, degrading to empty results: {}", e);
                return Ok(Vec::new());
            }
        };

        let results = match self.index.query_nearest(scope, &embedding.vector, limit).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Vector index read failed, degrading to empty results: {}", e);
                return Ok(Vec::new());
            }
        };

        // query_nearest already sorts; drop everything below the threshold
        let filtered: Vec<ScoredChunk> = results
            .into_iter()
            .filter(|r| r.score >= threshold)
            .collect();

        debug!("Semantic search returned {} chunks", filtered.len());
        Ok(filtered)
    }

    /// Context chunks for one meeting, at the single-meeting threshold.
    pub async fn get_context_chunks(
        &self,
        organization_id: Uuid,
        meeting_id: Uuid,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let scope = ChunkScope::meeting(organization_id, meeting_id);
        self.search_similar(query, &scope, limit, self.config.meeting_threshold)
            .await
    }

    /// Search across all of an organization's meetings, optionally restricted
    /// to an explicit subset of meeting ids. Uses the cross-meeting
    /// threshold.
    pub async fn cross_meeting_search(
        &self,
        organization_id: Uuid,
        query: &str,
        meeting_ids: Option<&[Uuid]>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let scope = ChunkScope::organization(organization_id);
        let results = self
            .search_similar(query, &scope, limit, self.config.hybrid_threshold)
            .await?;

        Ok(match meeting_ids {
            Some(ids) => results
                .into_iter()
                .filter(|r| ids.contains(&r.chunk.meeting_id))
                .collect(),
            None => results,
        })
    }
}
