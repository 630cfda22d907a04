//! Configuration settings for Referat.

use super::Prompts;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub chat: ChatSettings,
    pub llm: LlmSettings,
    pub storage: StorageSettings,
    pub prompts: Prompts,
}

/// General engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing engine data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.referat".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Transcript chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Target chunk size in tokens.
    pub chunk_tokens: usize,
    /// Overlap between consecutive chunks, in tokens.
    pub overlap_tokens: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_tokens: 500,
            overlap_tokens: 50,
        }
    }
}

/// Retrieval thresholds and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Minimum similarity for single-meeting context retrieval.
    pub meeting_threshold: f32,
    /// Minimum similarity for cross-meeting and hybrid retrieval.
    pub hybrid_threshold: f32,
    /// Default search result limit.
    pub default_limit: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            meeting_threshold: 0.7,
            hybrid_threshold: 0.6,
            default_limit: 10,
        }
    }
}

/// Conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Maximum prior turns sent to the generation model.
    pub max_history_messages: usize,
    /// Context chunk budget per question.
    pub max_context_chunks: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_history_messages: 10,
            max_context_chunks: 8,
        }
    }
}

/// Generation model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Primary chat model.
    pub primary_model: String,
    /// Fallback chat model, tried when the primary fails.
    pub fallback_model: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            primary_model: "gpt-4o".to_string(),
            fallback_model: Some("gpt-4o-mini".to_string()),
            temperature: 0.7,
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Path to the vector index database.
    pub vector_db_path: String,
    /// Path to the lexical search database.
    pub text_db_path: String,
    /// Path to the chat database.
    pub chat_db_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            vector_db_path: "~/.referat/vectors.db".to_string(),
            text_db_path: "~/.referat/text.db".to_string(),
            chat_db_path: "~/.referat/chat.db".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or the default location if None.
    /// A missing file yields defaults.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ReferatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("referat")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Expanded vector index database path.
    pub fn vector_db_path(&self) -> PathBuf {
        Self::expand_path(&self.storage.vector_db_path)
    }

    /// Expanded lexical search database path.
    pub fn text_db_path(&self) -> PathBuf {
        Self::expand_path(&self.storage.text_db_path)
    }

    /// Expanded chat database path.
    pub fn chat_db_path(&self) -> PathBuf {
        Self::expand_path(&self.storage.chat_db_path)
    }
}
