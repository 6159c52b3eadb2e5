//! The message entity held by the store.

use chrono::{DateTime, Utc};
use parley_chat_types::{MessageId, MessageRecord, UserId};

/// A message in a conversation.
///
/// Either confirmed (server-assigned id and timestamp) or a placeholder for
/// a local send that the server has not echoed back yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Server id, or `temp-<n>` for a placeholder.
    pub id: MessageId,
    /// Sender.
    pub sender_id: UserId,
    /// Receiver.
    pub receiver_id: UserId,
    /// Text body.
    pub payload: String,
    /// Server timestamp, or the local clock for a placeholder.
    pub created_at: DateTime<Utc>,
    confirmed: bool,
}

impl Message {
    /// Create a server-confirmed message.
    pub fn confirmed(
        id: MessageId,
        sender_id: UserId,
        receiver_id: UserId,
        payload: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sender_id,
            receiver_id,
            payload: payload.into(),
            created_at,
            confirmed: true,
        }
    }

    /// Create an unconfirmed placeholder for a local send.
    pub fn placeholder(
        id: MessageId,
        sender_id: UserId,
        receiver_id: UserId,
        payload: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sender_id,
            receiver_id,
            payload: payload.into(),
            created_at,
            confirmed: false,
        }
    }

    /// Whether the server has confirmed this message.
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// The participant on the other side from `local`.
    ///
    /// Returns `None` when `local` is neither the sender nor the receiver.
    pub fn partner_for(&self, local: &UserId) -> Option<&UserId> {
        if &self.sender_id == local {
            Some(&self.receiver_id)
        } else if &self.receiver_id == local {
            Some(&self.sender_id)
        } else {
            None
        }
    }
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self::confirmed(
            record.id,
            record.sender_id,
            record.receiver_id,
            record.payload.into_string(),
            record.created_at,
        )
    }
}
