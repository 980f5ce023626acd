//! Core conversation types: configuration, errors, identifiers and owners.

pub mod config;
pub mod errors;
pub mod ids;
pub mod owner;

pub use config::{AppConfig, LlmConfig, ServerConfig, StoreConfig};
pub use errors::{ConversationError, ConversationResult};
pub use ids::ConversationId;
pub use owner::{Owner, is_valid_username};
