//! Conversation subsystem for the Parlor agent.
//!
//! - `core`: configuration, errors, identifiers and owner identity
//! - `types`: records, transcript entries and presentation views
//! - `naming`: default and derived conversation names
//! - `store`: `SQLite` document store behind a repository trait
//! - `service`: the per-owner operations called by the presentation layer
//! - `session`: transcript to oracle history mapping
//! - `stream`: assembly of streamed answers into transcript snapshots

pub mod core;
pub mod naming;
pub mod service;
pub mod session;
pub mod store;
pub mod stream;
pub mod types;

pub use self::core::{
    AppConfig, ConversationError, ConversationId, ConversationResult, LlmConfig, Owner,
    ServerConfig, StoreConfig,
};
pub use service::ConversationStore;
pub use session::to_oracle_history;
pub use store::{ConversationRepository, SqliteConversationRepository, StoreFuture};
pub use stream::{SnapshotStream, StreamAssembler, StreamPhase, TranscriptSnapshot};
pub use types::{
    ConversationOverview, ConversationRecord, ConversationView, EntryMetadata, MessageEntry,
    Notice, RenameOutcome, Role,
};
