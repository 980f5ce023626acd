//! `SQLite`-backed conversation document store.
//!
//! Each row holds one record's document: scalar fields as columns, the transcript
//! as JSON text. Rows are encoded and decoded through the record's serde layout.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio_rusqlite::Connection;

use crate::conversations::core::config::StoreConfig;
use crate::conversations::core::errors::{ConversationError, ConversationResult};
use crate::conversations::core::owner::Owner;
use crate::conversations::types::ConversationRecord;

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Repository over conversation records. Every call is its own transaction.
pub trait ConversationRepository: Send + Sync {
    /// Live records of `owner`, newest creation first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn by_owner_not_deleted(
        &self,
        owner: &Owner,
    ) -> StoreFuture<'_, ConversationResult<Vec<ConversationRecord>>>;

    /// Live records of `owner` named exactly `name`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn by_owner_and_name(
        &self,
        owner: &Owner,
        name: &str,
    ) -> StoreFuture<'_, ConversationResult<Vec<ConversationRecord>>>;

    /// Insert a new record.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn insert(&self, record: &ConversationRecord) -> StoreFuture<'_, ConversationResult<()>>;

    /// Replace the stored record with the same id.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn save(&self, record: &ConversationRecord) -> StoreFuture<'_, ConversationResult<()>>;
}

/// Column values of one row, in the document layout of [`ConversationRecord`].
struct Columns {
    id: String,
    username: String,
    name: String,
    conversation: String,
    deleted: bool,
    ctime: String,
    utime: String,
}

impl Columns {
    /// Flatten a record through its serialized document.
    fn encode(record: &ConversationRecord) -> ConversationResult<Self> {
        let doc = serde_json::to_value(record)?;
        let text = |key: &str| {
            doc.get(key)
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .ok_or_else(|| ConversationError::InvalidRecord(format!("missing `{key}`")))
        };
        Ok(Self {
            id: text("id")?,
            username: text("username")?,
            name: text("name")?,
            conversation: serde_json::to_string(&doc["conversation"])?,
            deleted: doc["delete"].as_bool().unwrap_or_default(),
            ctime: text("ctime")?,
            utime: text("utime")?,
        })
    }

    /// Rebuild the document and deserialize it into a record.
    fn decode(self) -> ConversationResult<ConversationRecord> {
        let conversation: Value = serde_json::from_str(&self.conversation)?;
        let doc = json!({
            "id": self.id,
            "username": self.username,
            "name": self.name,
            "conversation": conversation,
            "delete": self.deleted,
            "ctime": self.ctime,
            "utime": self.utime,
        });
        Ok(serde_json::from_value(doc)?)
    }
}

/// `SQLite` implementation of the conversation repository.
pub struct SqliteConversationRepository {
    conn: Arc<Connection>,
    table: String,
}

impl SqliteConversationRepository {
    /// Open the database file from config and create the table if needed.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the database cannot be opened.
    pub async fn new(config: &StoreConfig) -> ConversationResult<Self> {
        config.validate()?;
        let conn = Connection::open(&config.sqlite_path).await?;
        Self::with_connection(Arc::new(conn), &config.table).await
    }

    /// Use an existing connection, e.g. an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the table cannot be created.
    pub async fn with_connection(conn: Arc<Connection>, table: &str) -> ConversationResult<Self> {
        StoreConfig {
            table: table.to_string(),
            ..StoreConfig::default()
        }
        .validate()?;
        let table = table.to_string();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    id TEXT NOT NULL UNIQUE,
                    username TEXT NOT NULL,
                    name TEXT NOT NULL,
                    conversation TEXT NOT NULL DEFAULT '[]',
                    \"delete\" INTEGER NOT NULL DEFAULT 0,
                    ctime TEXT NOT NULL,
                    utime TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table_name}_owner
                    ON {table_name} (username, \"delete\", ctime DESC);
                CREATE INDEX IF NOT EXISTS idx_{table_name}_owner_name
                    ON {table_name} (username, name);"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, table })
    }

    async fn select(
        &self,
        owner: &Owner,
        name: Option<&str>,
    ) -> ConversationResult<Vec<ConversationRecord>> {
        let table = self.table.clone();
        let username = owner.as_str().to_string();
        let name = name.map(ToString::to_string);

        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT id, username, name, conversation, \"delete\", ctime, utime
                     FROM {table}
                     WHERE username = ?1 AND \"delete\" = 0 AND (?2 IS NULL OR name = ?2)
                     ORDER BY ctime DESC, seq DESC"
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![username, name], |row| {
                        Ok(Columns {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            name: row.get(2)?,
                            conversation: row.get(3)?,
                            deleted: row.get(4)?,
                            ctime: row.get(5)?,
                            utime: row.get(6)?,
                        })
                    })?
                    .collect::<Result<Vec<Columns>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(Columns::decode).collect()
    }
}

impl ConversationRepository for SqliteConversationRepository {
    fn by_owner_not_deleted(
        &self,
        owner: &Owner,
    ) -> StoreFuture<'_, ConversationResult<Vec<ConversationRecord>>> {
        let owner = owner.clone();
        Box::pin(async move { self.select(&owner, None).await })
    }

    fn by_owner_and_name(
        &self,
        owner: &Owner,
        name: &str,
    ) -> StoreFuture<'_, ConversationResult<Vec<ConversationRecord>>> {
        let owner = owner.clone();
        let name = name.to_string();
        Box::pin(async move { self.select(&owner, Some(&name)).await })
    }

    fn insert(&self, record: &ConversationRecord) -> StoreFuture<'_, ConversationResult<()>> {
        let columns = Columns::encode(record);
        Box::pin(async move {
            let table = self.table.clone();
            let columns = columns?;

            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table}
                             (id, username, name, conversation, \"delete\", ctime, utime)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                        ),
                        rusqlite::params![
                            columns.id,
                            columns.username,
                            columns.name,
                            columns.conversation,
                            columns.deleted,
                            columns.ctime,
                            columns.utime
                        ],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn save(&self, record: &ConversationRecord) -> StoreFuture<'_, ConversationResult<()>> {
        let columns = Columns::encode(record);
        Box::pin(async move {
            let table = self.table.clone();
            let columns = columns?;

            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "UPDATE {table}
                             SET name = ?1, conversation = ?2, \"delete\" = ?3, utime = ?4
                             WHERE id = ?5"
                        ),
                        rusqlite::params![
                            columns.name,
                            columns.conversation,
                            columns.deleted,
                            columns.utime,
                            columns.id
                        ],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversations::types::MessageEntry;

    async fn repository() -> SqliteConversationRepository {
        let conn = Connection::open_in_memory().await.unwrap();
        SqliteConversationRepository::with_connection(Arc::new(conn), "conversations")
            .await
            .unwrap()
    }

    fn owner(name: &str) -> Owner {
        Owner::new(name).unwrap()
    }

    #[tokio::test]
    async fn insert_and_query_by_owner() {
        let repo = repository().await;
        let record = ConversationRecord::new(owner("alice"), "one", vec![MessageEntry::user("hi")]);
        repo.insert(&record).await.unwrap();
        repo.insert(&ConversationRecord::new(owner("bob"), "two", Vec::new()))
            .await
            .unwrap();

        let rows = repo.by_owner_not_deleted(&owner("alice")).await.unwrap();
        assert_eq!(rows, vec![record]);
    }

    #[tokio::test]
    async fn newest_creation_comes_first() {
        let repo = repository().await;
        for name in ["a", "b", "c"] {
            repo.insert(&ConversationRecord::new(owner("alice"), name, Vec::new()))
                .await
                .unwrap();
        }

        let names: Vec<String> = repo
            .by_owner_not_deleted(&owner("alice"))
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn deleted_rows_are_hidden_and_save_replaces() {
        let repo = repository().await;
        let mut record = ConversationRecord::new(owner("alice"), "doomed", Vec::new());
        repo.insert(&record).await.unwrap();

        record.transcript.push(MessageEntry::assistant("bye"));
        repo.save(&record).await.unwrap();
        let found = repo.by_owner_and_name(&owner("alice"), "doomed").await.unwrap();
        assert_eq!(found[0].transcript.len(), 1);

        record.deleted = true;
        repo.save(&record).await.unwrap();
        assert!(repo
            .by_owner_and_name(&owner("alice"), "doomed")
            .await
            .unwrap()
            .is_empty());
        assert!(repo.by_owner_not_deleted(&owner("alice")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rows_hold_the_document_layout() {
        let conn = Arc::new(Connection::open_in_memory().await.unwrap());
        let repo = SqliteConversationRepository::with_connection(Arc::clone(&conn), "conversations")
            .await
            .unwrap();
        let record = ConversationRecord::new(owner("alice"), "doc", vec![MessageEntry::user("hi")]);
        repo.insert(&record).await.unwrap();

        let (id, conversation, ctime): (String, String, String) = conn
            .call(|conn| {
                Ok(conn.query_row(
                    "SELECT id, conversation, ctime FROM conversations",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(id, record.id.to_string());
        let conversation: Value = serde_json::from_str(&conversation).unwrap();
        assert_eq!(conversation, json!([{"role": "user", "content": "hi"}]));
        assert_eq!(ctime.len(), "YYYY-MM-DD HH:MM:SS".len());
    }

    #[tokio::test]
    async fn corrupt_rows_fail_to_decode() {
        let conn = Arc::new(Connection::open_in_memory().await.unwrap());
        let repo = SqliteConversationRepository::with_connection(Arc::clone(&conn), "conversations")
            .await
            .unwrap();
        conn.call(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, username, name, conversation, ctime, utime)
                 VALUES ('x', 'alice', 'bad', '[]', 'yesterday', 'today')",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        let result = repo.by_owner_not_deleted(&owner("alice")).await;
        assert!(matches!(result, Err(ConversationError::Serialization(_))));
    }

    #[tokio::test]
    async fn rejects_unsafe_table_name() {
        let conn = Connection::open_in_memory().await.unwrap();
        let result =
            SqliteConversationRepository::with_connection(Arc::new(conn), "bad name").await;
        assert!(matches!(result, Err(ConversationError::InvalidConfig(_))));
    }
}
