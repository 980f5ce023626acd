//! Configuration for the conversation service, the oracle client and the server.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::conversations::core::errors::{ConversationError, ConversationResult};

/// Environment variable for the `SQLite` database path.
const DB_PATH_ENV: &str = "PARLOR_DB";
/// Environment variable for the conversation table name.
const TABLE_ENV: &str = "PARLOR_TABLE";
/// Environment variable for a custom Ollama URL.
const OLLAMA_URL_ENV: &str = "PARLOR_OLLAMA_URL";
/// Environment variable for the chat model name.
const MODEL_ENV: &str = "PARLOR_MODEL";
/// Environment variable for the HTTP port.
const PORT_ENV: &str = "PARLOR_PORT";
/// Environment variable for the static presentation directory.
const STATIC_DIR_ENV: &str = "PARLOR_STATIC_DIR";

/// Top-level application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Conversation storage settings.
    pub storage: StoreConfig,
    /// Oracle (chat model) settings.
    pub llm: LlmConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

impl AppConfig {
    /// Defaults overlaid with `PARLOR_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var(DB_PATH_ENV) {
            config.storage.sqlite_path = PathBuf::from(path);
        }
        if let Ok(table) = std::env::var(TABLE_ENV) {
            config.storage.table = table;
        }
        if let Ok(base_url) = std::env::var(OLLAMA_URL_ENV) {
            config.llm.base_url = base_url;
        }
        if let Ok(model) = std::env::var(MODEL_ENV) {
            config.llm.model = model;
        }
        if let Some(port) = std::env::var(PORT_ENV).ok().and_then(|p| p.parse().ok()) {
            config.server.port = port;
        }
        if let Ok(dir) = std::env::var(STATIC_DIR_ENV) {
            config.server.static_dir = PathBuf::from(dir);
        }

        config
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ConversationResult<()> {
        self.storage.validate()?;

        if self.llm.model.trim().is_empty() {
            return Err(ConversationError::InvalidConfig(
                "llm.model must not be empty".to_string(),
            ));
        }
        Url::parse(&self.llm.base_url)?;

        if self.server.port == 0 {
            return Err(ConversationError::InvalidConfig(
                "server.port must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Storage configuration for conversation records.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Conversation table name.
    pub table: String,
}

impl StoreConfig {
    /// Validate the table name; it is interpolated into SQL.
    ///
    /// # Errors
    /// Returns an error if the table name is empty or not a plain identifier.
    pub fn validate(&self) -> ConversationResult<()> {
        let valid = !self.table.is_empty()
            && !self.table.starts_with(|c: char| c.is_ascii_digit())
            && self
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(ConversationError::InvalidConfig(format!(
                "storage.table `{}` is not a plain identifier",
                self.table
            )));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("parlor.sqlite"),
            table: "conversations".to_string(),
        }
    }
}

/// Chat model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama base URL.
    pub base_url: String,
    /// Ollama chat model name.
    pub model: String,
    /// Instructions prepended to every history.
    pub system_prompt: String,
    /// How long Ollama keeps the model resident.
    pub keep_alive: String,
    /// Temperature for generation.
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "qwen2.5:7b-instruct".to_string(),
            system_prompt: "You are a helpful assistant.".to_string(),
            keep_alive: "1h".to_string(),
            temperature: 0.7,
        }
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
    /// Directory holding the browser presentation layer.
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            static_dir: PathBuf::from("static"),
        }
    }
}
