//! Oracle abstraction: history in, incremental text fragments out.

use std::future::Future;
use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversations::types::Role;

/// Errors produced while talking to the oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    /// HTTP client error.
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    /// HTTP response was not a success.
    #[error("oracle http status not ok: {0}")]
    HttpStatusNotOk(u16),
    /// A stream frame could not be decoded.
    #[error("malformed stream frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),
    /// The oracle reported an error inside the stream.
    #[error("oracle error: {0}")]
    Remote(String),
}

/// Convenience result alias for oracle operations.
pub type OracleResult<T> = Result<T, OracleError>;

/// One history entry as the oracle sees it: role and content only.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: String,
}

/// Event emitted by the oracle while answering.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OracleEvent {
    /// Incremental text fragment.
    TextDelta(String),
    /// Anything else (tool activity, final statistics); carries a short label.
    Other(String),
}

/// Stream of oracle events, ended by stream completion.
pub type OracleStream = Pin<Box<dyn Stream<Item = OracleResult<OracleEvent>> + Send>>;

/// Boxed future type for oracle calls.
pub type OracleFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Completion service producing a delta stream from conversation history.
pub trait ChatOracle: Send + Sync {
    /// Start answering `history`.
    ///
    /// # Errors
    /// Returns an error if the request cannot be started.
    fn stream_chat(&self, history: Vec<ChatMessage>) -> OracleFuture<'_, OracleResult<OracleStream>>;
}
