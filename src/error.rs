//! Error types for Referat.

use thiserror::Error;

/// Library-level error type for Referat operations.
#[derive(Error, Debug)]
pub enum ReferatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector index error: {0}")]
    VectorIndex(String),

    #[error("Text search error: {0}")]
    TextSearch(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("No generation provider available")]
    NoProviderAvailable,

    #[error("Provider quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Transcript error: {0}")]
    Transcript(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type alias for Referat operations.
pub type Result<T> = std::result::Result<T, ReferatError>;
