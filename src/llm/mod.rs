//! Chat model ("oracle") interface and the Ollama streaming client.

pub mod ollama_chat;
pub mod oracle;

pub use ollama_chat::OllamaChat;
pub use oracle::{
    ChatMessage, ChatOracle, OracleError, OracleEvent, OracleFuture, OracleResult, OracleStream,
};
