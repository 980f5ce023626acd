//! Error types for the conversation subsystem.

use thiserror::Error;

/// Conversation subsystem error type.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// No usable identity could be derived from the caller.
    #[error("invalid owner: {0}")]
    InvalidOwner(String),
    /// A stored record could not be decoded.
    #[error("invalid conversation record: {0}")]
    InvalidRecord(String),
    /// A conversation that must exist was not found.
    #[error("conversation not found: {0}")]
    NotFound(String),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Convenience result alias for conversation operations.
pub type ConversationResult<T> = Result<T, ConversationError>;
