//! Conversation store for Parley.
//!
//! The store is the single authoritative record of conversations and their
//! messages. It is a plain in-memory structure: no I/O, no interior
//! mutability. `chat-client` owns exactly one instance and is its only
//! writer; readers borrow it.
//!
//! Guarantees upheld by every mutating call:
//! - at most one conversation per partner (the map key is the partner id)
//! - messages sorted by `created_at`, ties in arrival order
//! - no two messages in a conversation share a server id
//! - the summary reflects the last message before the call returns

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parley_chat_types::{ChatSummary, MessageId, UserId};
use thiserror::Error;

use crate::conversation::{Conversation, DisplayName, Summary};
use crate::Message;

/// Errors returned by store mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No conversation exists for this partner.
    #[error("no conversation with {0}")]
    UnknownConversation(UserId),

    /// The placeholder to replace is not (or no longer) present.
    #[error("placeholder {id} not found in conversation with {partner}")]
    PlaceholderNotFound {
        /// Conversation partner.
        partner: UserId,
        /// Placeholder id that was looked up.
        id: MessageId,
    },

    /// A confirmed message was required.
    #[error("message {0} is not confirmed")]
    NotConfirmed(MessageId),

    /// A placeholder was required.
    #[error("message {0} is already confirmed")]
    AlreadyConfirmed(MessageId),
}

/// Result of inserting a confirmed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The message was inserted.
    Inserted,
    /// A message with the same server id was already present; nothing changed.
    Duplicate,
}

/// The authoritative mapping from partner to conversation.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: HashMap<UserId, Conversation>,
    /// Last placeholder sequence handed out. Survives `reset` so ids never repeat.
    placeholder_seq: u64,
}

impl ConversationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a conversation.
    pub fn get(&self, partner: &UserId) -> Option<&Conversation> {
        self.conversations.get(partner)
    }

    /// Whether a conversation with this partner exists.
    pub fn contains(&self, partner: &UserId) -> bool {
        self.conversations.contains_key(partner)
    }

    /// Known partners (unordered).
    pub fn partners(&self) -> impl Iterator<Item = &UserId> {
        self.conversations.keys()
    }

    /// Number of conversations.
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether the store holds no conversations.
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Conversations ordered by last message time (newest first), ties by
    /// partner id ascending. Conversations with no known activity sort last.
    pub fn list(&self) -> Vec<&Conversation> {
        let mut list: Vec<&Conversation> = self.conversations.values().collect();
        list.sort_by(|a, b| {
            b.last_message_at()
                .cmp(&a.last_message_at())
                .then_with(|| a.partner_id().cmp(b.partner_id()))
        });
        list
    }

    /// Hand out the next placeholder id (`temp-<n>`).
    pub fn next_placeholder_id(&mut self) -> MessageId {
        self.placeholder_seq += 1;
        MessageId::placeholder(self.placeholder_seq)
    }

    /// Create the conversation if absent. An existing non-empty display name
    /// is left untouched; an empty `display_name` never overwrites anything.
    ///
    /// Returns `true` if the conversation was created.
    pub fn upsert_conversation(&mut self, partner: &UserId, display_name: &str) -> bool {
        match self.conversations.get_mut(partner) {
            Some(conversation) => {
                let has_name = matches!(conversation.display_name(), DisplayName::Known(_));
                if !has_name && !display_name.is_empty() {
                    conversation.set_display_name(DisplayName::Known(display_name.to_string()));
                }
                false
            }
            None => {
                let name = if display_name.is_empty() {
                    DisplayName::Provisional
                } else {
                    DisplayName::Known(display_name.to_string())
                };
                self.conversations
                    .insert(partner.clone(), Conversation::new(partner.clone(), name, None));
                true
            }
        }
    }

    /// Start an empty conversation (explicit new chat), seeded at `now` so it
    /// sorts to the top of the list. Returns `false` if it already existed.
    pub fn open_conversation(
        &mut self,
        partner: &UserId,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.upsert_conversation(partner, display_name) {
            return false;
        }
        if let Some(conversation) = self.conversations.get_mut(partner) {
            conversation.set_seed(Summary::new("", now));
        }
        true
    }

    /// Populate the store from the chat list snapshot: one conversation per
    /// row, seeded with the row's summary. Message history is not touched.
    pub fn apply_snapshot(&mut self, chats: &[ChatSummary]) {
        for chat in chats {
            self.upsert_conversation(&chat.partner_id, &chat.display_name);
            if let Some(conversation) = self.conversations.get_mut(&chat.partner_id) {
                conversation.set_seed(Summary::new(
                    chat.last_message_preview.clone(),
                    chat.last_message_at,
                ));
            }
        }
    }

    /// Insert a confirmed message, creating the conversation if needed.
    ///
    /// A message whose server id is already present is rejected as a
    /// duplicate and leaves the store unchanged.
    pub fn append_confirmed(
        &mut self,
        partner: &UserId,
        message: Message,
    ) -> Result<AppendOutcome, StoreError> {
        if !message.is_confirmed() {
            return Err(StoreError::NotConfirmed(message.id));
        }
        let conversation = self.entry(partner);
        if conversation.contains(&message.id) {
            return Ok(AppendOutcome::Duplicate);
        }
        conversation.insert_ordered(message);
        conversation.refresh_summary();
        Ok(AppendOutcome::Inserted)
    }

    /// Insert a placeholder for a local send, creating the conversation if needed.
    pub fn append_optimistic(&mut self, partner: &UserId, message: Message) -> Result<(), StoreError> {
        if message.is_confirmed() {
            return Err(StoreError::AlreadyConfirmed(message.id));
        }
        let conversation = self.entry(partner);
        conversation.insert_ordered(message);
        conversation.refresh_summary();
        Ok(())
    }

    /// Remove a placeholder and insert its confirmed counterpart at the
    /// position its timestamp implies, in one step.
    ///
    /// If the confirmed id is already present the placeholder is still
    /// removed and [`AppendOutcome::Duplicate`] is returned.
    pub fn replace(
        &mut self,
        partner: &UserId,
        placeholder_id: &MessageId,
        confirmed: Message,
    ) -> Result<AppendOutcome, StoreError> {
        if !confirmed.is_confirmed() {
            return Err(StoreError::NotConfirmed(confirmed.id));
        }
        let conversation = self
            .conversations
            .get_mut(partner)
            .ok_or_else(|| StoreError::UnknownConversation(partner.clone()))?;

        let is_pending = conversation
            .pending()
            .any(|m| &m.id == placeholder_id);
        if !is_pending {
            return Err(StoreError::PlaceholderNotFound {
                partner: partner.clone(),
                id: placeholder_id.clone(),
            });
        }

        conversation.remove(placeholder_id);
        let outcome = if conversation.contains(&confirmed.id) {
            AppendOutcome::Duplicate
        } else {
            conversation.insert_ordered(confirmed);
            AppendOutcome::Inserted
        };
        conversation.refresh_summary();
        Ok(outcome)
    }

    /// Replace a conversation's messages with an authoritative history.
    ///
    /// `history` must be confirmed messages (any order; sorted here, repeated
    /// ids collapsed). `retained` are placeholders to keep alongside them.
    /// Creates the conversation if needed; returns `true` in that case.
    pub fn replace_history(
        &mut self,
        partner: &UserId,
        mut history: Vec<Message>,
        retained: Vec<Message>,
    ) -> Result<bool, StoreError> {
        if let Some(unconfirmed) = history.iter().find(|m| !m.is_confirmed()) {
            return Err(StoreError::NotConfirmed(unconfirmed.id.clone()));
        }
        if let Some(confirmed) = retained.iter().find(|m| m.is_confirmed()) {
            return Err(StoreError::AlreadyConfirmed(confirmed.id.clone()));
        }

        let created = !self.contains(partner);
        let conversation = self.entry(partner);
        conversation.clear_messages();

        history.sort_by_key(|m| m.created_at);
        let mut seen = HashSet::new();
        for message in history {
            if seen.insert(message.id.clone()) {
                conversation.insert_ordered(message);
            }
        }
        for placeholder in retained {
            conversation.insert_ordered(placeholder);
        }
        conversation.refresh_summary();
        Ok(created)
    }

    /// Record a resolved display name.
    pub fn set_display_name(&mut self, partner: &UserId, name: &str) -> Result<(), StoreError> {
        let conversation = self
            .conversations
            .get_mut(partner)
            .ok_or_else(|| StoreError::UnknownConversation(partner.clone()))?;
        if !name.is_empty() {
            conversation.set_display_name(DisplayName::Known(name.to_string()));
        }
        Ok(())
    }

    /// Record that the display name could not be resolved. The label stays
    /// the partner id for good. A known name is never downgraded.
    pub fn mark_name_unresolved(&mut self, partner: &UserId) -> Result<(), StoreError> {
        let conversation = self
            .conversations
            .get_mut(partner)
            .ok_or_else(|| StoreError::UnknownConversation(partner.clone()))?;
        if matches!(conversation.display_name(), DisplayName::Provisional) {
            conversation.set_display_name(DisplayName::Unresolved);
        }
        Ok(())
    }

    /// Drop every conversation (logout).
    pub fn reset(&mut self) {
        self.conversations.clear();
    }

    fn entry(&mut self, partner: &UserId) -> &mut Conversation {
        self.conversations
            .entry(partner.clone())
            .or_insert_with(|| Conversation::new(partner.clone(), DisplayName::Provisional, None))
    }
}
