//! Retrieval over indexed meeting content.
//!
//! Two arms feed question answering: semantic nearest-neighbor search over
//! chunk embeddings and ranked lexical search, fused into one result set.

mod hybrid;
mod semantic;

pub use hybrid::{fuse, HybridHit, HybridSearcher, HybridSource};
pub use semantic::SemanticRetriever;

/// Retrieval thresholds and limits.
///
/// Single-meeting and cross-meeting search historically use different
/// similarity cutoffs; they stay separate knobs rather than one unified
/// threshold.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalConfig {
    /// Minimum similarity for single-meeting context retrieval.
    pub meeting_threshold: f32,
    /// Minimum similarity for cross-meeting / hybrid retrieval.
    pub hybrid_threshold: f32,
    /// Default result limit when the caller does not specify one.
    pub default_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            meeting_threshold: 0.7,
            hybrid_threshold: 0.6,
            default_limit: 10,
        }
    }
}
