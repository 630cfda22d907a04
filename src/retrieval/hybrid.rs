//! Hybrid fusion of semantic and lexical retrieval.
//!
//! Semantic results seed the fused set; lexical hits either merge into an
//! existing entry for the same meeting (tagged `Both`, keeping the higher
//! score) or join as lexical-only entries. Deduplication is at meeting
//! granularity even though semantic retrieval operates on chunks.

use super::semantic::SemanticRetriever;
use crate::error::Result;
use crate::lexical::{DateRange, HitKind, TextHit, TextSearch};
use crate::scope::ChunkScope;
use crate::vector_index::ScoredChunk;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Which retrieval arm(s) produced a fused hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HybridSource {
    Semantic,
    Lexical,
    Both,
}

/// One entry of a fused result set.
#[derive(Debug, Clone)]
pub struct HybridHit {
    pub meeting_id: Uuid,
    pub meeting_title: String,
    pub score: f32,
    pub source: HybridSource,
    /// Chunk text or highlighted lexical excerpt.
    pub excerpt: String,
    /// Formatted timestamp, when the hit came from a timed chunk.
    pub timestamp: Option<String>,
    /// The lexical hit's type tag, when a lexical arm contributed.
    pub kind: Option<HitKind>,
}

/// Merge semantic and lexical result sets, dedupe by meeting, combine
/// scores, tag provenance.
///
/// Deterministic: the same inputs always produce the same output.
pub fn fuse(semantic: Vec<ScoredChunk>, lexical: Vec<TextHit>, limit: usize) -> Vec<HybridHit> {
    let mut fused: Vec<HybridHit> = Vec::new();

    for result in semantic {
        if fused.iter().any(|h| h.meeting_id == result.chunk.meeting_id) {
            // chunks arrive sorted, the first per meeting carries the top score
            continue;
        }
        fused.push(HybridHit {
            meeting_id: result.chunk.meeting_id,
            meeting_title: result.chunk.meeting_title.clone(),
            score: result.score,
            source: HybridSource::Semantic,
            timestamp: result.chunk.format_timestamp(),
            excerpt: result.chunk.text,
            kind: None,
        });
    }

    for hit in lexical {
        match fused.iter_mut().find(|h| h.meeting_id == hit.meeting_id) {
            Some(existing) => {
                // `Both` means present in both arms; a second lexical hit for
                // the same meeting (FTS matches per column) never upgrades a
                // lexical-only entry.
                if existing.source == HybridSource::Semantic {
                    existing.source = HybridSource::Both;
                }
                existing.score = existing.score.max(hit.score);
                if existing.kind.is_none() {
                    existing.kind = Some(hit.kind);
                }
            }
            None => {
                fused.push(HybridHit {
                    meeting_id: hit.meeting_id,
                    meeting_title: hit.meeting_title,
                    score: hit.score,
                    source: HybridSource::Lexical,
                    excerpt: hit.excerpt,
                    timestamp: None,
                    kind: Some(hit.kind),
                });
            }
        }
    }

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fused.truncate(limit);
    fused
}

/// Runs both retrieval arms concurrently and fuses the results.
pub struct HybridSearcher {
    semantic: Arc<SemanticRetriever>,
    lexical: Arc<dyn TextSearch>,
}

impl HybridSearcher {
    pub fn new(semantic: Arc<SemanticRetriever>, lexical: Arc<dyn TextSearch>) -> Self {
        Self { semantic, lexical }
    }

    /// Hybrid search within a scope.
    ///
    /// When the embedder is unavailable the semantic arm yields nothing and
    /// the fused output is lexical-only.
    #[instrument(skip(self), fields(query = %query))]
    pub async fn search(
        &self,
        query: &str,
        scope: &ChunkScope,
        limit: usize,
        date_range: Option<DateRange>,
    ) -> Result<Vec<HybridHit>> {
        scope.validate()?;

        let threshold = self.semantic.config().hybrid_threshold;
        let (semantic, lexical) = tokio::join!(
            self.semantic.search_similar(query, scope, limit, threshold),
            self.lexical.search_text(query, scope, date_range),
        );

        let hits = fuse(semantic?, lexical?, limit);
        debug!("Hybrid search fused {} hits", hits.len());
        Ok(hits)
    }
}
