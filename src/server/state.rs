//! Application state shared across all request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::conversations::core::config::AppConfig;
use crate::conversations::service::ConversationStore;
use crate::conversations::store::SqliteConversationRepository;
use crate::conversations::stream::StreamAssembler;
use crate::llm::OllamaChat;
use crate::llm::oracle::ChatOracle;

/// Shared application state.
pub struct AppState {
    /// Conversation operations.
    pub store: Arc<ConversationStore>,
    /// Answer assembly over the oracle.
    pub assembler: StreamAssembler,
    /// Model name reported by the health endpoint.
    pub model_name: String,
    /// Directory of the browser presentation layer.
    pub static_dir: PathBuf,
}

impl AppState {
    /// Assemble state from already-built parts.
    #[must_use]
    pub fn new(
        store: ConversationStore,
        oracle: Arc<dyn ChatOracle>,
        model_name: impl Into<String>,
        static_dir: impl Into<PathBuf>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store: Arc::new(store),
            assembler: StreamAssembler::new(oracle),
            model_name: model_name.into(),
            static_dir: static_dir.into(),
        })
    }

    /// Open the conversation database and build the Ollama client from config.
    ///
    /// # Errors
    /// Returns an error if the config is invalid, the database cannot be opened,
    /// or the HTTP client cannot be created.
    pub async fn from_config(
        config: &AppConfig,
    ) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        config.validate()?;

        let repo = SqliteConversationRepository::new(&config.storage)
            .await
            .map_err(|e| format!("Failed to open conversation store: {e}"))?;
        let oracle = OllamaChat::new(config.llm.clone())
            .map_err(|e| format!("Failed to create Ollama client: {e}"))?;
        let model_name = oracle.model().to_string();

        Ok(Self::new(
            ConversationStore::new(Arc::new(repo)),
            Arc::new(oracle),
            model_name,
            config.server.static_dir.clone(),
        ))
    }
}
