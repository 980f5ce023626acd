//! Types for conversation management.

use std::fmt;

use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

use crate::conversations::core::ids::ConversationId;
use crate::conversations::core::owner::Owner;

/// Storage format of `ctime` / `utime`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time truncated to whole seconds, as stored.
#[must_use]
pub fn now_timestamp() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

/// Serde adapter for `YYYY-MM-DD HH:MM:SS` timestamps.
pub mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    /// Serialize a timestamp in storage format.
    ///
    /// # Errors
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(TIMESTAMP_FORMAT).to_string())
    }

    /// Deserialize a timestamp from storage format.
    ///
    /// # Errors
    /// Returns an error if the string does not match the storage format.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Author of a transcript entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

impl Role {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Presentation flags attached to a transcript entry.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Marks the transient "thinking" placeholder.
    #[serde(default)]
    pub is_thinking: bool,
}

/// One message in a transcript.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageEntry {
    /// Who wrote the entry.
    pub role: Role,
    /// Text or markup content.
    pub content: String,
    /// Optional flags; absent for real content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EntryMetadata>,
}

impl MessageEntry {
    /// Build a user entry.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            metadata: None,
        }
    }

    /// Build an assistant entry.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            metadata: None,
        }
    }

    /// Build the assistant placeholder shown while waiting for the oracle.
    #[must_use]
    pub fn thinking(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            metadata: Some(EntryMetadata { is_thinking: true }),
        }
    }

    /// Whether this entry is a thinking placeholder.
    ///
    /// The flag's value decides, so stored `{"is_thinking": false}` counts as real content.
    #[must_use]
    pub fn is_thinking(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.is_thinking)
    }
}

/// A persisted conversation, laid out as a document in the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Immutable identifier.
    pub id: ConversationId,
    /// Owning identity.
    #[serde(rename = "username")]
    pub owner: Owner,
    /// Display name, unique among the owner's live records.
    pub name: String,
    /// Ordered transcript.
    #[serde(rename = "conversation")]
    pub transcript: Vec<MessageEntry>,
    /// Soft-delete flag.
    #[serde(rename = "delete")]
    pub deleted: bool,
    /// Creation time.
    #[serde(rename = "ctime", with = "timestamp")]
    pub created_at: NaiveDateTime,
    /// Last content or name change.
    #[serde(rename = "utime", with = "timestamp")]
    pub updated_at: NaiveDateTime,
}

impl ConversationRecord {
    /// Create a fresh live record stamped with the current time.
    #[must_use]
    pub fn new(owner: Owner, name: impl Into<String>, transcript: Vec<MessageEntry>) -> Self {
        let now = now_timestamp();
        Self {
            id: ConversationId::new(),
            owner,
            name: name.into(),
            transcript,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = now_timestamp();
    }

    /// Presentation view of this record.
    #[must_use]
    pub fn view(&self) -> ConversationView {
        ConversationView {
            name: self.name.clone(),
            transcript: self.transcript.clone(),
        }
    }
}

/// Name and transcript pair exchanged with the presentation layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationView {
    /// Conversation name.
    pub name: String,
    /// Conversation transcript.
    pub transcript: Vec<MessageEntry>,
}

impl ConversationView {
    /// View with an empty transcript.
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transcript: Vec::new(),
        }
    }
}

/// Page-load state: every live name plus the most recently updated conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationOverview {
    /// Live names, newest first.
    pub names: Vec<String>,
    /// Most recently updated conversation.
    pub current: ConversationView,
}

/// Non-fatal, user-visible notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    /// The requested name is empty.
    EmptyName,
    /// The requested name belongs to another conversation.
    DuplicateName,
}

impl Notice {
    /// Message shown to the user.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::EmptyName => "The name can not be empty!",
            Self::DuplicateName => "Duplicate name! Please rename it!",
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of a rename request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameOutcome {
    /// Name in effect afterwards.
    pub name: String,
    /// Why the rename was refused, if it was.
    pub notice: Option<Notice>,
}
