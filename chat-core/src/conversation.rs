//! A single two-party conversation.
//!
//! Messages are kept sorted by `created_at` (non-decreasing, ties in arrival
//! order). The summary fields are never set directly: every mutation goes
//! through the store, which calls [`Conversation::refresh_summary`] before
//! returning.

use chrono::{DateTime, Utc};
use parley_chat_types::{MessageId, UserId};

use crate::Message;

/// Display name state for a conversation partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayName {
    /// Not known yet; a lookup may be in flight. Rendered as the partner id.
    Provisional,
    /// Resolved name.
    Known(String),
    /// Lookup failed. Rendered as the partner id and never retried.
    Unresolved,
}

/// Denormalized "last message" line shown in the conversation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Text of the last message.
    pub preview: String,
    /// Timestamp of the last message.
    pub at: DateTime<Utc>,
}

impl Summary {
    /// Create a summary.
    pub fn new(preview: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            preview: preview.into(),
            at,
        }
    }

    fn of(message: &Message) -> Self {
        Self::new(message.payload.clone(), message.created_at)
    }
}

/// Conversation state for one partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    partner_id: UserId,
    display_name: DisplayName,
    messages: Vec<Message>,
    /// Summary supplied at creation (snapshot row or new-chat time), used
    /// only while `messages` is empty.
    seed: Option<Summary>,
    summary: Option<Summary>,
}

impl Conversation {
    pub(crate) fn new(partner_id: UserId, display_name: DisplayName, seed: Option<Summary>) -> Self {
        let mut conversation = Self {
            partner_id,
            display_name,
            messages: Vec::new(),
            seed,
            summary: None,
        };
        conversation.refresh_summary();
        conversation
    }

    /// The partner's id (the store key).
    pub fn partner_id(&self) -> &UserId {
        &self.partner_id
    }

    /// Display name state.
    pub fn display_name(&self) -> &DisplayName {
        &self.display_name
    }

    /// Label for rendering: the resolved name, or the partner id.
    pub fn label(&self) -> &str {
        match &self.display_name {
            DisplayName::Known(name) => name,
            DisplayName::Provisional | DisplayName::Unresolved => self.partner_id.as_str(),
        }
    }

    /// Messages in chronological order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Placeholders still awaiting confirmation, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| !m.is_confirmed())
    }

    /// Text of the last message, if any is known.
    pub fn last_message_preview(&self) -> Option<&str> {
        self.summary.as_ref().map(|s| s.preview.as_str())
    }

    /// Timestamp of the last message, if any is known.
    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.summary.as_ref().map(|s| s.at)
    }

    /// Whether a message with this id is present.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }

    pub(crate) fn set_display_name(&mut self, display_name: DisplayName) {
        self.display_name = display_name;
    }

    pub(crate) fn set_seed(&mut self, seed: Summary) {
        self.seed = Some(seed);
        self.refresh_summary();
    }

    /// Insert after every message with `created_at <= message.created_at`.
    pub(crate) fn insert_ordered(&mut self, message: Message) -> usize {
        let index = self
            .messages
            .partition_point(|m| m.created_at <= message.created_at);
        self.messages.insert(index, message);
        index
    }

    pub(crate) fn remove(&mut self, id: &MessageId) -> Option<Message> {
        let index = self.messages.iter().position(|m| &m.id == id)?;
        Some(self.messages.remove(index))
    }

    pub(crate) fn clear_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }

    pub(crate) fn refresh_summary(&mut self) {
        self.summary = match self.messages.last() {
            Some(last) => Some(Summary::of(last)),
            None => self.seed.clone(),
        };
    }
}
