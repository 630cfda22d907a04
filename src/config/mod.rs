//! Configuration module for Referat.
//!
//! Handles loading and managing engine settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::Prompts;
pub use settings::{
    ChatSettings, ChunkingSettings, EmbeddingSettings, GeneralSettings, LlmSettings,
    RetrievalSettings, Settings, StorageSettings,
};
