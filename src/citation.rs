//! Citation building.
//!
//! Maps the chunks that were actually supplied to a generation call into
//! user-facing citations. Citations are derived values, persisted only as
//! part of the assistant message that references them.

use crate::vector_index::ScoredChunk;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum excerpt length in characters.
const MAX_EXCERPT_CHARS: usize = 200;

/// A pointer from a generated answer back to its source chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub meeting_id: Uuid,
    pub meeting_title: String,
    /// Formatted timestamp (e.g. "02:34"), when the chunk carried timing.
    pub timestamp: Option<String>,
    /// Bounded excerpt of the chunk text.
    pub text: String,
    /// First listed speaker of the chunk, if any.
    pub speaker: Option<String>,
    /// Similarity score clamped to [0, 1].
    pub relevance: f32,
}

/// Build one citation per context chunk, preserving retrieval order.
pub fn build_citations(context_chunks: &[ScoredChunk]) -> Vec<Citation> {
    context_chunks
        .iter()
        .map(|result| Citation {
            meeting_id: result.chunk.meeting_id,
            meeting_title: result.chunk.meeting_title.clone(),
            timestamp: result.chunk.format_timestamp(),
            text: excerpt(&result.chunk.text),
            speaker: result.chunk.speakers.first().cloned(),
            relevance: result.score.clamp(0.0, 1.0),
        })
        .collect()
}

/// Truncate chunk text to a bounded excerpt at a char boundary.
fn excerpt(text: &str) -> String {
    if text.chars().count() <= MAX_EXCERPT_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(MAX_EXCERPT_CHARS).collect();
    format!("{}…", truncated.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_index::Chunk;

    fn scored(text: &str, speakers: Vec<String>, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk::new(
                Uuid::new_v4(),
                Uuid::new_v4(),
                "Design review".to_string(),
                0,
                text.to_string(),
                Some(154.0),
                Some(200.0),
                speakers,
                vec![],
            ),
            score,
        }
    }

    #[test]
    fn test_one_citation_per_chunk_in_order() {
        let chunks = vec![
            scored("first chunk", vec!["Alice".to_string()], 0.9),
            scored("second chunk", vec![], 0.7),
        ];

        let citations = build_citations(&chunks);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].text, "first chunk");
        assert_eq!(citations[0].speaker.as_deref(), Some("Alice"));
        assert_eq!(citations[0].timestamp.as_deref(), Some("02:34"));
        assert_eq!(citations[1].speaker, None);
        assert!(citations[0].relevance > citations[1].relevance);
    }

    #[test]
    fn test_long_chunk_text_is_bounded() {
        let long = "word ".repeat(200);
        let citations = build_citations(&[scored(&long, vec![], 0.8)]);
        assert!(citations[0].text.chars().count() <= MAX_EXCERPT_CHARS + 1);
        assert!(citations[0].text.ends_with('…'));
    }

    #[test]
    fn test_relevance_is_clamped() {
        let citations = build_citations(&[scored("t", vec![], 1.7), scored("t", vec![], -0.2)]);
        assert_eq!(citations[0].relevance, 1.0);
        assert_eq!(citations[1].relevance, 0.0);
    }

    #[test]
    fn test_empty_input_yields_no_citations() {
        assert!(build_citations(&[]).is_empty());
    }
}
