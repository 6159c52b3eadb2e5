//! Records returned by the request/response API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MessageId, Payload, UserId};

/// One row of the chat list snapshot (`GET /api/chats`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    /// The conversation partner
    #[serde(rename = "user_id")]
    pub partner_id: UserId,
    /// Partner's display name
    #[serde(rename = "username")]
    pub display_name: String,
    /// Text of the most recent message
    #[serde(rename = "last_message", default)]
    pub last_message_preview: String,
    /// Timestamp of the most recent message
    #[serde(rename = "last_message_time")]
    pub last_message_at: DateTime<Utc>,
}

/// A stored message (`GET /api/messages/{partner}`), also the complete form
/// of an inbound push frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Server-assigned id
    pub id: MessageId,
    /// Sender
    pub sender_id: UserId,
    /// Receiver
    pub receiver_id: UserId,
    /// Message body
    pub payload: Payload,
    /// Server-assigned timestamp
    pub created_at: DateTime<Utc>,
}

/// A user as returned by the lookup endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User id
    pub id: UserId,
    /// Unique username, used as the display name
    pub username: String,
}
