//! Envelope - the push channel frame.
//!
//! The same JSON object shape is used in both directions. Outbound frames
//! carry only the receiver and the body; the server assigns the sender, the
//! id and the timestamp before pushing the frame to the receiver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MessageId, MessageRecord, Payload, UserId, WireError};

/// A frame on the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Server-assigned message id (absent on outbound frames)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Sender (absent on outbound frames, taken from the session)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,
    /// Receiver of the message
    pub receiver_id: UserId,
    /// Message body
    pub payload: Payload,
    /// Server-assigned timestamp (absent on outbound frames)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Envelope {
    /// Build an outbound frame addressed to `receiver`.
    pub fn outbound(receiver: UserId, payload: impl Into<Payload>) -> Self {
        Self {
            id: None,
            sender_id: None,
            receiver_id: receiver,
            payload: payload.into(),
            created_at: None,
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(WireError::Serialization)
    }

    /// Deserialize from a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, WireError> {
        serde_json::from_str(text).map_err(WireError::Deserialization)
    }

    /// Convert an inbound frame into a complete message record.
    ///
    /// Fails if any server-assigned field is missing.
    pub fn into_record(self) -> Result<MessageRecord, WireError> {
        Ok(MessageRecord {
            id: self.id.ok_or(WireError::MissingField("id"))?,
            sender_id: self.sender_id.ok_or(WireError::MissingField("sender_id"))?,
            receiver_id: self.receiver_id,
            payload: self.payload,
            created_at: self
                .created_at
                .ok_or(WireError::MissingField("created_at"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_frame_omits_server_fields() {
        let frame = Envelope::outbound(UserId::from("u2"), "hi");
        let json = frame.to_json().unwrap();
        assert_eq!(json, r#"{"receiver_id":"u2","payload":[104,105]}"#);
    }

    #[test]
    fn inbound_frame_converts_to_record() {
        let json = r#"{
            "id": "m1",
            "sender_id": "u2",
            "receiver_id": "u1",
            "payload": "aGV5",
            "created_at": "2024-05-01T10:00:00Z"
        }"#;
        let record = Envelope::from_json(json).unwrap().into_record().unwrap();
        assert_eq!(record.id, MessageId::from("m1"));
        assert_eq!(record.sender_id, UserId::from("u2"));
        assert_eq!(record.payload.as_str(), "hey");
    }

    #[test]
    fn inbound_frame_without_id_is_incomplete() {
        let json = r#"{
            "sender_id": "u2",
            "receiver_id": "u1",
            "payload": [104],
            "created_at": "2024-05-01T10:00:00Z"
        }"#;
        let err = Envelope::from_json(json)
            .unwrap()
            .into_record()
            .unwrap_err();
        assert!(matches!(err, WireError::MissingField("id")));
    }

    #[test]
    fn malformed_frame_fails_to_parse() {
        assert!(matches!(
            Envelope::from_json("{not json"),
            Err(WireError::Deserialization(_))
        ));
        assert!(Envelope::from_json(r#"{"payload": [1]}"#).is_err());
    }
}
