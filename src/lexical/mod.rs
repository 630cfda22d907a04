//! Ranked full-text search over meeting content.
//!
//! The lexical arm of hybrid retrieval: keyword matches over meeting titles,
//! transcripts, summaries and action items, used as a complementary signal
//! next to semantic search and as the fallback when embeddings are
//! unavailable.

mod sqlite;

pub use sqlite::{MeetingRecord, SqliteTextIndex};

use crate::error::Result;
use crate::scope::ChunkScope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which part of a meeting a lexical hit matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    Meeting,
    Transcript,
    Summary,
    ActionItem,
}

/// A ranked full-text match.
#[derive(Debug, Clone)]
pub struct TextHit {
    pub kind: HitKind,
    pub meeting_id: Uuid,
    pub meeting_title: String,
    /// Normalized relevance in [0, 1], higher is better.
    pub score: f32,
    /// Excerpt with matched terms wrapped in `**` markers.
    pub excerpt: String,
}

/// Inclusive date bounds on meeting creation time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Trait for lexical search implementations.
#[async_trait]
pub trait TextSearch: Send + Sync {
    /// Ranked full-text search within a scope.
    ///
    /// An empty or whitespace-only query returns an empty result set without
    /// touching the search backend.
    async fn search_text(
        &self,
        query: &str,
        scope: &ChunkScope,
        date_range: Option<DateRange>,
    ) -> Result<Vec<TextHit>>;
}
