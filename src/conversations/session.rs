//! Mapping between the persisted transcript and the history sent to the oracle.

use crate::conversations::types::MessageEntry;
use crate::llm::oracle::ChatMessage;

/// History for the oracle: thinking placeholders dropped, metadata stripped.
#[must_use]
pub fn to_oracle_history(transcript: &[MessageEntry]) -> Vec<ChatMessage> {
    transcript
        .iter()
        .filter(|entry| !entry.is_thinking())
        .map(|entry| ChatMessage {
            role: entry.role,
            content: entry.content.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversations::types::Role;

    #[test]
    fn drops_thinking_entries_and_metadata() {
        let transcript = vec![
            MessageEntry::user("2+2?"),
            MessageEntry::thinking("Thinking done"),
            MessageEntry::assistant("4"),
            MessageEntry::user("and 3+3?"),
        ];

        let history = to_oracle_history(&transcript);
        assert_eq!(
            history,
            vec![
                ChatMessage { role: Role::User, content: "2+2?".to_string() },
                ChatMessage { role: Role::Assistant, content: "4".to_string() },
                ChatMessage { role: Role::User, content: "and 3+3?".to_string() },
            ]
        );
    }

    #[test]
    fn empty_transcript_gives_empty_history() {
        assert!(to_oracle_history(&[]).is_empty());
    }
}
