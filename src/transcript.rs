//! Transcript provider abstraction.
//!
//! The surrounding system owns recording and transcription; the engine only
//! reads finished transcripts through this trait when a meeting is indexed
//! or when a chat needs the meeting summary.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One timed utterance within a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Speaker label, if diarization produced one.
    pub speaker: Option<String>,
    /// Text of the utterance.
    pub text: String,
    /// Start time in seconds from the beginning of the meeting.
    pub start_time: Option<f64>,
    /// End time in seconds.
    pub end_time: Option<f64>,
}

impl TranscriptSegment {
    pub fn new(
        speaker: Option<String>,
        text: impl Into<String>,
        start_time: Option<f64>,
        end_time: Option<f64>,
    ) -> Self {
        Self {
            speaker,
            text: text.into(),
            start_time,
            end_time,
        }
    }
}

/// A finished transcript for one meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingTranscript {
    pub meeting_id: Uuid,
    pub organization_id: Uuid,
    /// Meeting title.
    pub title: String,
    /// Full transcript text, used when no timed segments are available.
    pub full_text: String,
    /// Timed, speaker-attributed segments (may be empty).
    pub segments: Vec<TranscriptSegment>,
    /// Optional meeting summary.
    pub summary: Option<String>,
    /// Optional action items, one per line.
    pub action_items: Option<String>,
}

/// Read-only access to finished transcripts.
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// Fetch the transcript for a meeting.
    async fn fetch(&self, meeting_id: Uuid) -> Result<MeetingTranscript>;
}
