//! Reconciliation of confirmed messages against local state.
//!
//! Every confirmed message, whether pushed live or loaded as history, goes
//! through the [`Reconciler`] before it reaches the store. It decides which
//! conversation the message belongs to, whether it confirms a pending local
//! send, and whether it is a replay of something already stored.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parley_chat_types::{MessageId, UserId};
use thiserror::Error;

use crate::conversation::Conversation;
use crate::store::{AppendOutcome, ConversationStore, StoreError};
use crate::Message;

/// Errors from reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The message involves neither side as the local user.
    #[error("message {id} from {sender} to {receiver} does not involve the local user")]
    Foreign {
        /// Message id.
        id: MessageId,
        /// Sender on the message.
        sender: UserId,
        /// Receiver on the message.
        receiver: UserId,
    },

    /// The store rejected the mutation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to a confirmed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The message confirmed a pending local send; the placeholder was replaced.
    Confirmed {
        /// Conversation partner.
        partner: UserId,
        /// Placeholder that was removed.
        placeholder: MessageId,
        /// Server id now stored in its place.
        message_id: MessageId,
    },
    /// The message was stored as a new entry.
    Appended {
        /// Conversation partner.
        partner: UserId,
        /// Server id.
        message_id: MessageId,
        /// Whether the conversation was created for this message.
        new_conversation: bool,
    },
    /// A message with this server id was already stored; nothing changed.
    Duplicate {
        /// Conversation partner.
        partner: UserId,
        /// Server id.
        message_id: MessageId,
    },
}

impl Reconciliation {
    /// The conversation partner affected.
    pub fn partner(&self) -> &UserId {
        match self {
            Self::Confirmed { partner, .. }
            | Self::Appended { partner, .. }
            | Self::Duplicate { partner, .. } => partner,
        }
    }

    /// Whether the store changed.
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Duplicate { .. })
    }
}

/// Result of applying a history load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryOutcome {
    /// Conversation partner.
    pub partner: UserId,
    /// Confirmed messages now in the conversation.
    pub loaded: usize,
    /// Placeholders dropped because the history already contains them.
    pub confirmed_placeholders: Vec<MessageId>,
    /// Placeholders kept because nothing in the history matched them.
    pub retained: usize,
    /// History rows that belong to a different conversation.
    pub skipped: usize,
    /// Whether the conversation was created by this load.
    pub new_conversation: bool,
}

/// Matches confirmed messages to conversations and pending sends.
#[derive(Debug, Clone)]
pub struct Reconciler {
    local_user: UserId,
    tolerance: Option<Duration>,
}

impl Reconciler {
    /// Default window between a placeholder's local time and the server
    /// timestamp of its confirmation.
    pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(120);

    /// Create a reconciler for `local_user` with the default tolerance.
    pub fn new(local_user: UserId) -> Self {
        Self {
            local_user,
            tolerance: Some(Self::DEFAULT_TOLERANCE),
        }
    }

    /// Set the match window. `None` matches regardless of timestamps.
    pub fn with_tolerance(mut self, tolerance: Option<Duration>) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// The local user.
    pub fn local_user(&self) -> &UserId {
        &self.local_user
    }

    /// The partner a message belongs to, from the local user's side.
    pub fn partner_of<'a>(&self, message: &'a Message) -> Option<&'a UserId> {
        message.partner_for(&self.local_user)
    }

    /// Apply one confirmed message to the store.
    ///
    /// Order of checks: partner, server-id dedup, oldest matching
    /// placeholder, plain append. The conversation is created with a
    /// provisional name when the partner is new.
    pub fn apply(
        &self,
        store: &mut ConversationStore,
        message: Message,
    ) -> Result<Reconciliation, ReconcileError> {
        if !message.is_confirmed() {
            return Err(StoreError::NotConfirmed(message.id).into());
        }
        let partner = self.require_partner(&message)?;
        let message_id = message.id.clone();

        let new_conversation = store.upsert_conversation(&partner, "");
        let conversation = store
            .get(&partner)
            .ok_or_else(|| StoreError::UnknownConversation(partner.clone()))?;

        if conversation.contains(&message_id) {
            return Ok(Reconciliation::Duplicate {
                partner,
                message_id,
            });
        }

        if let Some(placeholder) = self.oldest_match(conversation, &partner, &message) {
            // Dedup ran above, so the replacement always inserts.
            store.replace(&partner, &placeholder, message)?;
            return Ok(Reconciliation::Confirmed {
                partner,
                placeholder,
                message_id,
            });
        }

        match store.append_confirmed(&partner, message)? {
            AppendOutcome::Inserted => Ok(Reconciliation::Appended {
                partner,
                message_id,
                new_conversation,
            }),
            AppendOutcome::Duplicate => Ok(Reconciliation::Duplicate {
                partner,
                message_id,
            }),
        }
    }

    /// Apply an authoritative history for `partner`.
    ///
    /// Confirmed messages are replaced wholesale. Each pending placeholder is
    /// matched against the history with the same rule as live messages; a
    /// matched placeholder is dropped, the rest are kept. Rows that belong
    /// to another conversation are skipped.
    pub fn apply_history(
        &self,
        store: &mut ConversationStore,
        partner: &UserId,
        history: Vec<Message>,
    ) -> Result<HistoryOutcome, ReconcileError> {
        let total = history.len();
        let history: Vec<Message> = history
            .into_iter()
            .filter(|m| m.is_confirmed() && self.partner_of(m) == Some(partner))
            .collect();
        let skipped = total - history.len();

        // Nothing to show for a partner we have never talked to.
        if history.is_empty() && !store.contains(partner) {
            return Ok(HistoryOutcome {
                partner: partner.clone(),
                loaded: 0,
                confirmed_placeholders: Vec::new(),
                retained: 0,
                skipped,
                new_conversation: false,
            });
        }

        let pending: Vec<Message> = store
            .get(partner)
            .map(|c| c.pending().cloned().collect())
            .unwrap_or_default();

        let mut consumed = vec![false; history.len()];
        let mut retained = Vec::new();
        let mut confirmed_placeholders = Vec::new();
        for placeholder in pending {
            let hit = history.iter().enumerate().position(|(i, m)| {
                !consumed[i] && self.matches(&placeholder, partner, m)
            });
            match hit {
                Some(i) => {
                    consumed[i] = true;
                    confirmed_placeholders.push(placeholder.id);
                }
                None => retained.push(placeholder),
            }
        }

        let retained_count = retained.len();
        let new_conversation = store.replace_history(partner, history, retained)?;
        let loaded = store
            .get(partner)
            .map(|c| c.messages().iter().filter(|m| m.is_confirmed()).count())
            .unwrap_or(0);

        Ok(HistoryOutcome {
            partner: partner.clone(),
            loaded,
            confirmed_placeholders,
            retained: retained_count,
            skipped,
            new_conversation,
        })
    }

    /// Record a local send: append a placeholder stamped `now` and return it.
    pub fn record_send(
        &self,
        store: &mut ConversationStore,
        partner: &UserId,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Message, ReconcileError> {
        let id = store.next_placeholder_id();
        let placeholder = Message::placeholder(id, self.local_user.clone(), partner.clone(), text, now);
        store.append_optimistic(partner, placeholder.clone())?;
        Ok(placeholder)
    }

    fn require_partner(&self, message: &Message) -> Result<UserId, ReconcileError> {
        self.partner_of(message)
            .cloned()
            .ok_or_else(|| ReconcileError::Foreign {
                id: message.id.clone(),
                sender: message.sender_id.clone(),
                receiver: message.receiver_id.clone(),
            })
    }

    fn oldest_match(
        &self,
        conversation: &Conversation,
        partner: &UserId,
        message: &Message,
    ) -> Option<MessageId> {
        conversation
            .pending()
            .find(|p| self.matches(p, partner, message))
            .map(|p| p.id.clone())
    }

    fn matches(&self, placeholder: &Message, partner: &UserId, message: &Message) -> bool {
        message.sender_id == self.local_user
            && &message.receiver_id == partner
            && placeholder.receiver_id == message.receiver_id
            && placeholder.payload == message.payload
            && self.within_window(placeholder.created_at, message.created_at)
    }

    fn within_window(&self, local: DateTime<Utc>, server: DateTime<Utc>) -> bool {
        let Some(tolerance) = self.tolerance else {
            return true;
        };
        let skew = if local > server { local - server } else { server - local };
        skew.to_std().map(|s| s <= tolerance).unwrap_or(false)
    }
}
