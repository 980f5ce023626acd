//! Owner identity used to partition conversations.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::conversations::core::errors::{ConversationError, ConversationResult};

/// Accepted username shape for authenticated principals.
const USERNAME_PATTERN: &str = r"^\w{4,16}$";

fn username_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(USERNAME_PATTERN).ok()).as_ref()
}

/// Login predicate: only the username shape is checked.
#[must_use]
pub fn is_valid_username(username: &str) -> bool {
    username_regex().is_some_and(|re| re.is_match(username))
}

/// Opaque, non-empty identity string owning a set of conversations.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Owner(String);

impl Owner {
    /// Wrap an identity string.
    ///
    /// # Errors
    /// Returns an error if the identity is empty or whitespace.
    pub fn new(identity: impl Into<String>) -> ConversationResult<Self> {
        let identity = identity.into();
        if identity.trim().is_empty() {
            return Err(ConversationError::InvalidOwner(
                "identity must not be empty".to_string(),
            ));
        }
        Ok(Self(identity))
    }

    /// Resolve the owner from an authenticated username, falling back to the
    /// anonymous session handle.
    ///
    /// # Errors
    /// Returns an error if neither source yields a non-empty identity.
    pub fn resolve(username: Option<&str>, session: Option<&str>) -> ConversationResult<Self> {
        username
            .filter(|u| !u.trim().is_empty())
            .map_or_else(|| Self::new(session.unwrap_or_default()), Self::new)
    }

    /// Identity string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Owner {
    type Error = ConversationError;

    fn try_from(identity: String) -> ConversationResult<Self> {
        Self::new(identity)
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        owner.0
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
