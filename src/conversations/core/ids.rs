//! Identifier types for conversation records.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Unique identifier of a conversation record, assigned once at creation.
///
/// Rendered and serialized in the compact hex form stored in the `id` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ConversationId(Uuid);

impl Default for ConversationId {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationId {
    /// Create a new random identifier.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ConversationId {
    type Err = uuid::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Serialize for ConversationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConversationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_form_parses_back() {
        let id = ConversationId::new();
        let hex = id.to_string();
        assert_eq!(hex.len(), 32);
        let parsed: ConversationId = hex.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn serializes_as_hex_string() {
        let id = ConversationId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
        let restored: ConversationId = serde_json::from_value(json).unwrap();
        assert_eq!(restored, id);
        assert!(serde_json::from_str::<ConversationId>("\"nope\"").is_err());
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(ConversationId::new(), ConversationId::new());
    }
}
