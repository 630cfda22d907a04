//! Transcript chunking.
//!
//! Splits transcript text into bounded, overlapping word windows that
//! preserve speaker and timing metadata. Chunking is pure and deterministic:
//! the same input and configuration always produce identical boundaries, so
//! re-indexing a meeting regenerates the exact same chunk set.

use crate::transcript::TranscriptSegment;
use serde::{Deserialize, Serialize};

/// Configuration for the word-window chunker.
///
/// Budgets are expressed in tokens; the chunker approximates tokens with
/// whitespace-delimited words at a 75% word/token ratio.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Target chunk size in tokens.
    pub chunk_tokens: usize,
    /// Overlap between consecutive chunks, in tokens.
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_tokens: 500,
            overlap_tokens: 50,
        }
    }
}

impl ChunkingConfig {
    /// Words per chunk derived from the token budget.
    pub fn words_per_chunk(&self) -> usize {
        (self.chunk_tokens * 3 / 4).max(1)
    }

    /// Overlap words derived from the overlap-token budget, always smaller
    /// than the window so every chunk makes forward progress.
    pub fn overlap_words(&self) -> usize {
        (self.overlap_tokens * 3 / 4).min(self.words_per_chunk().saturating_sub(1))
    }
}

/// A chunk produced from timed segments, carrying the metadata needed for
/// citations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentChunk {
    /// Chunk text.
    pub text: String,
    /// Earliest start time spanned by the chunk's words.
    pub start_time: Option<f64>,
    /// Latest end time spanned by the chunk's words.
    pub end_time: Option<f64>,
    /// Distinct speakers in order of first appearance.
    pub speakers: Vec<String>,
}

/// Word-window chunker.
#[derive(Debug, Clone, Default)]
pub struct WordWindowChunker {
    config: ChunkingConfig,
}

/// One word with the metadata of the segment it came from.
struct TimedWord<'a> {
    word: &'a str,
    speaker: Option<&'a str>,
    start_time: Option<f64>,
    end_time: Option<f64>,
}

impl WordWindowChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split plain text into overlapping word windows.
    ///
    /// Empty input yields an empty sequence. A trailing partial window is
    /// always emitted as the final chunk.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        self.windows(words.len())
            .into_iter()
            .map(|(start, end)| words[start..end].join(" "))
            .collect()
    }

    /// Split timed segments into overlapping word windows, tracking the
    /// speakers and the min/max timestamps spanned by each window.
    pub fn chunk_segments(&self, segments: &[TranscriptSegment]) -> Vec<SegmentChunk> {
        let words: Vec<TimedWord<'_>> = segments
            .iter()
            .flat_map(|seg| {
                seg.text.split_whitespace().map(move |word| TimedWord {
                    word,
                    speaker: seg.speaker.as_deref(),
                    start_time: seg.start_time,
                    end_time: seg.end_time,
                })
            })
            .collect();

        self.windows(words.len())
            .into_iter()
            .map(|(start, end)| {
                let window = &words[start..end];

                let text = window
                    .iter()
                    .map(|w| w.word)
                    .collect::<Vec<_>>()
                    .join(" ");

                let start_time = window
                    .iter()
                    .filter_map(|w| w.start_time)
                    .fold(None::<f64>, |acc, t| Some(acc.map_or(t, |a| a.min(t))));
                let end_time = window
                    .iter()
                    .filter_map(|w| w.end_time)
                    .fold(None::<f64>, |acc, t| Some(acc.map_or(t, |a| a.max(t))));

                let mut speakers: Vec<String> = Vec::new();
                for w in window {
                    if let Some(speaker) = w.speaker {
                        if !speakers.iter().any(|s| s == speaker) {
                            speakers.push(speaker.to_string());
                        }
                    }
                }

                SegmentChunk {
                    text,
                    start_time,
                    end_time,
                    speakers,
                }
            })
            .collect()
    }

    /// Compute the `[start, end)` word ranges of every window.
    ///
    /// Each window after the first starts `overlap_words` before the end of
    /// the previous one.
    fn windows(&self, word_count: usize) -> Vec<(usize, usize)> {
        let per_chunk = self.config.words_per_chunk();
        let overlap = self.config.overlap_words();

        let mut ranges = Vec::new();
        let mut start = 0;
        while start < word_count {
            let end = (start + per_chunk).min(word_count);
            ranges.push((start, end));
            if end == word_count {
                break;
            }
            start = end - overlap;
        }
        ranges
    }
}
