//! Message body encoding.
//!
//! The server stores bodies as raw bytes. Its JSON encoder emits them as a
//! base64 string, while clients send them as an array of byte values. Both
//! forms are accepted on input; output always uses the byte array.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Text body of a message.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Payload(String);

impl Payload {
    /// Create a payload from text.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Decode a payload from raw bytes, replacing invalid UTF-8 sequences.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Borrow the text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take ownership of the text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({:?})", self.0)
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.as_bytes())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPayload {
    Encoded(String),
    Bytes(Vec<u8>),
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawPayload::deserialize(deserializer)? {
            RawPayload::Encoded(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map(|bytes| Payload::from_bytes(&bytes))
                .map_err(|e| serde::de::Error::custom(format!("invalid base64 payload: {e}"))),
            RawPayload::Bytes(bytes) => Ok(Payload::from_bytes(&bytes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_byte_array() {
        let json = serde_json::to_string(&Payload::from("hi")).unwrap();
        assert_eq!(json, "[104,105]");
    }

    #[test]
    fn accepts_base64_string() {
        // "aGV5" is base64 for "hey"
        let payload: Payload = serde_json::from_str("\"aGV5\"").unwrap();
        assert_eq!(payload.as_str(), "hey");
    }

    #[test]
    fn accepts_byte_array() {
        let payload: Payload = serde_json::from_str("[104,101,121]").unwrap();
        assert_eq!(payload.as_str(), "hey");
    }

    #[test]
    fn rejects_non_base64_string() {
        let result: Result<Payload, _> = serde_json::from_str("\"not base64!\"");
        assert!(result.is_err());
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let payload = Payload::from_bytes(&[0x68, 0xff, 0x69]);
        assert_eq!(payload.as_str(), "h\u{fffd}i");
    }

    #[test]
    fn multibyte_text_survives_encoding() {
        let original = Payload::from("привет 👋");
        let json = serde_json::to_string(&original).unwrap();
        let restored: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, original);
    }
}
