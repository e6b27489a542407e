//! Error types shared across the pipeline crates

use thiserror::Error;

/// Result alias used throughout `narrata-core` and its dependents
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for the narration pipeline
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("repository error: {0}")]
    Repository(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("book not found: {0}")]
    BookNotFound(String),

    #[error("pipeline already running for book {0}")]
    AlreadyRunning(String),

    #[error("no pipeline running for book {0}")]
    NotRunning(String),

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("pipeline panic: {0}")]
    Panic(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid segment: {0}")]
    InvalidSegment(String),
}
