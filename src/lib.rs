//! Referat: meeting-intelligence retrieval and question answering.
//!
//! Indexes meeting transcripts into a tenant-scoped vector index and a
//! full-text index, retrieves relevant chunks semantically, lexically or
//! fused, and drives grounded multi-turn conversations with citations back
//! into the source meetings.
//!
//! The embedding application owns meetings, users and transport; Referat
//! plugs in behind a [`transcript::TranscriptProvider`] and is driven
//! through [`engine::Engine`].

pub mod chat;
pub mod chunking;
pub mod citation;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod lexical;
pub mod llm;
pub mod openai;
pub mod retrieval;
pub mod scope;
pub mod transcript;
pub mod vector_index;

pub use engine::{Engine, EngineComponents};
pub use error::{ReferatError, Result};
