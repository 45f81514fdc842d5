//! Error types for Skue.

use thiserror::Error;

/// Library-level error type for Skue operations.
#[derive(Error, Debug)]
pub enum SkueError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Segment store error: {0}")]
    SegmentStore(String),

    #[error("Chat store error: {0}")]
    ChatStore(String),

    #[error("Metadata store error: {0}")]
    Metadata(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Rerank failed: {0}")]
    Rerank(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Ingestion failed: {0}")]
    Ingestion(String),

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

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Skue operations.
pub type Result<T> = std::result::Result<T, SkueError>;
