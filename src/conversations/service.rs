//! Conversation operations consumed by the presentation layer.
//!
//! Every operation is scoped by an [`Owner`] and opens its own transactions
//! against the repository; there is no cross-call locking, so concurrent writes
//! to the same record resolve as last write wins.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::conversations::core::errors::{ConversationError, ConversationResult};
use crate::conversations::core::owner::Owner;
use crate::conversations::naming;
use crate::conversations::store::ConversationRepository;
use crate::conversations::types::{
    ConversationOverview, ConversationRecord, ConversationView, MessageEntry, Notice,
    RenameOutcome,
};

/// Conversation store over any repository backend.
pub struct ConversationStore {
    repo: Arc<dyn ConversationRepository>,
}

impl ConversationStore {
    /// Wrap a repository.
    #[must_use]
    pub const fn new(repo: Arc<dyn ConversationRepository>) -> Self {
        Self { repo }
    }

    async fn live_names(&self, owner: &Owner) -> ConversationResult<HashSet<String>> {
        Ok(self
            .repo
            .by_owner_not_deleted(owner)
            .await?
            .into_iter()
            .map(|record| record.name)
            .collect())
    }

    /// Live conversation names, newest creation first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn list_names(&self, owner: &Owner) -> ConversationResult<Vec<String>> {
        debug!("Listing conversation names for owner: {owner}");
        let mut names: Vec<String> = Vec::new();
        for record in self.repo.by_owner_not_deleted(owner).await? {
            if !names.contains(&record.name) {
                names.push(record.name);
            }
        }
        Ok(names)
    }

    /// Most recently updated live conversation, creating the default one for an
    /// owner that has none.
    ///
    /// # Errors
    /// Returns `NotFound` if no conversation exists even after creation, or an
    /// error if storage access fails.
    pub async fn get_latest(&self, owner: &Owner) -> ConversationResult<ConversationView> {
        debug!("Getting latest conversation for owner: {owner}");
        if let Some(record) = self.latest_record(owner).await? {
            return Ok(record.view());
        }

        self.create(owner, None, None).await?;
        self.latest_record(owner)
            .await?
            .as_ref()
            .map(ConversationRecord::view)
            .ok_or_else(|| ConversationError::NotFound(format!("no conversation for {owner}")))
    }

    async fn latest_record(&self, owner: &Owner) -> ConversationResult<Option<ConversationRecord>> {
        // Rows arrive newest creation first; on equal `updated_at` the newer row wins.
        let mut latest: Option<ConversationRecord> = None;
        for record in self.repo.by_owner_not_deleted(owner).await? {
            if latest
                .as_ref()
                .is_none_or(|best| record.updated_at > best.updated_at)
            {
                latest = Some(record);
            }
        }
        Ok(latest)
    }

    /// Page-load state: all live names plus the latest conversation.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn overview(&self, owner: &Owner) -> ConversationResult<ConversationOverview> {
        let current = self.get_latest(owner).await?;
        let names = self.list_names(owner).await?;
        Ok(ConversationOverview { names, current })
    }

    /// Live conversation named `name`; an unknown name yields an empty transcript.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn get_by_name(&self, owner: &Owner, name: &str) -> ConversationResult<ConversationView> {
        debug!("Getting conversation `{name}` for owner: {owner}");
        let found = self.repo.by_owner_and_name(owner, name).await?;
        Ok(found
            .first()
            .map_or_else(|| ConversationView::empty(name), ConversationRecord::view))
    }

    /// Start a new default-named conversation.
    ///
    /// When the caller passes the previous conversation's name and a non-empty
    /// transcript, that conversation is saved first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn create(
        &self,
        owner: &Owner,
        name: Option<&str>,
        transcript: Option<&[MessageEntry]>,
    ) -> ConversationResult<ConversationView> {
        debug!("Creating a new conversation for owner: {owner}");
        if let (Some(previous), Some(entries)) = (name, transcript.filter(|t| !t.is_empty())) {
            self.update(owner, previous, entries).await?;
        }

        let taken = self.live_names(owner).await?;
        let new_name = naming::next_default_name(|candidate| taken.contains(candidate));
        let record = ConversationRecord::new(owner.clone(), new_name, Vec::new());
        self.repo.insert(&record).await?;
        Ok(record.view())
    }

    /// Append a user message. The first message of a default-named conversation
    /// renames it after the message and persists both; otherwise the transcript is
    /// only extended in memory.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn append_user_message(
        &self,
        owner: &Owner,
        text: &str,
        name: &str,
        mut transcript: Vec<MessageEntry>,
    ) -> ConversationResult<ConversationView> {
        debug!("Adding user message for owner: {owner}");
        transcript.push(MessageEntry::user(text));

        let candidate = naming::derive_candidate(text);
        if transcript.len() != 1 || !naming::is_default_name(name) || candidate.is_empty() {
            return Ok(ConversationView {
                name: name.to_string(),
                transcript,
            });
        }

        let taken = self.live_names(owner).await?;
        let new_name = naming::unique_name(&candidate, |c| taken.contains(c));

        let existing = self.repo.by_owner_and_name(owner, name).await?;
        if let Some(mut record) = existing.into_iter().next() {
            record.name.clone_from(&new_name);
            record.transcript.clone_from(&transcript);
            record.touch();
            self.repo.save(&record).await?;
        } else {
            let record = ConversationRecord::new(owner.clone(), new_name.clone(), transcript.clone());
            self.repo.insert(&record).await?;
        }
        debug!("Renamed conversation `{name}` to `{new_name}` for owner: {owner}");

        Ok(ConversationView {
            name: new_name,
            transcript,
        })
    }

    /// Persist `transcript` on the live conversation named `name`. No match is a no-op.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn update(
        &self,
        owner: &Owner,
        name: &str,
        transcript: &[MessageEntry],
    ) -> ConversationResult<()> {
        debug!("Updating conversation `{name}` for owner: {owner}");
        let Some(mut record) = self.repo.by_owner_and_name(owner, name).await?.into_iter().next()
        else {
            warn!("No conversation `{name}` to update for owner: {owner}");
            return Ok(());
        };

        record.transcript = transcript.to_vec();
        record.touch();
        self.repo.save(&record).await
    }

    /// Soft-delete the conversation named `name` and return the first remaining
    /// one, creating a default conversation if none remain.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn soft_delete(&self, owner: &Owner, name: &str) -> ConversationResult<ConversationView> {
        debug!("Deleting conversation `{name}` for owner: {owner}");
        let matches = self.repo.by_owner_and_name(owner, name).await?;
        if matches.is_empty() {
            error!("The conversation `{name}` for owner {owner} does not exist");
        }
        for mut record in matches {
            record.deleted = true;
            record.name = naming::deleted_name(name);
            record.touch();
            self.repo.save(&record).await?;
        }

        let mut names = self.list_names(owner).await?;
        if names.is_empty() {
            self.create(owner, None, None).await?;
            names = self.list_names(owner).await?;
        }
        match names.first() {
            Some(first) => self.get_by_name(owner, first).await,
            None => Err(ConversationError::NotFound(format!("no conversation for {owner}"))),
        }
    }

    /// Rename `old_name` to `new_name`. Empty or already-used names are refused
    /// with a notice and the old name stays in effect.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn rename(
        &self,
        owner: &Owner,
        old_name: &str,
        new_name: &str,
    ) -> ConversationResult<RenameOutcome> {
        debug!("Renaming conversation `{old_name}` for owner: {owner}");
        if new_name.is_empty() {
            return Ok(RenameOutcome {
                name: old_name.to_string(),
                notice: Some(Notice::EmptyName),
            });
        }
        if new_name == old_name {
            return Ok(RenameOutcome {
                name: old_name.to_string(),
                notice: None,
            });
        }
        if !self.repo.by_owner_and_name(owner, new_name).await?.is_empty() {
            return Ok(RenameOutcome {
                name: old_name.to_string(),
                notice: Some(Notice::DuplicateName),
            });
        }

        for mut record in self.repo.by_owner_and_name(owner, old_name).await? {
            record.name = new_name.to_string();
            record.touch();
            self.repo.save(&record).await?;
        }

        Ok(RenameOutcome {
            name: new_name.to_string(),
            notice: None,
        })
    }
}
