//! History loading.
//!
//! Both bulk reads the orchestrator makes: the chat list snapshot at session
//! start, and one conversation's history on selection. The server returns
//! history newest first; the store wants chronological order.

use std::sync::Arc;

use parley_chat_core::Message;
use parley_chat_types::{ChatSummary, UserId};
use tracing::debug;

use crate::api::ChatApi;
use crate::credentials::SessionToken;
use crate::ChatError;

/// Fetches the chat list and conversation histories.
#[derive(Debug)]
pub struct HistoryLoader<A: ChatApi> {
    api: Arc<A>,
}

impl<A: ChatApi> Clone for HistoryLoader<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
        }
    }
}

impl<A: ChatApi> HistoryLoader<A> {
    /// Loader over a shared API client.
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Fetch the chat list snapshot, one row per conversation.
    pub async fn snapshot(&self, token: &SessionToken) -> Result<Vec<ChatSummary>, ChatError> {
        let chats = self.api.chats(token).await?;
        debug!(count = chats.len(), "chat list fetched");
        Ok(chats)
    }

    /// Fetch the history with `partner`, oldest first.
    pub async fn load(
        &self,
        token: &SessionToken,
        partner: &UserId,
    ) -> Result<Vec<Message>, ChatError> {
        let mut records = self.api.messages(token, partner).await?;
        records.reverse();
        debug!(partner = %partner, count = records.len(), "history fetched");
        Ok(records.into_iter().map(Message::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockApi;
    use chrono::{TimeZone, Utc};
    use parley_chat_types::{MessageId, MessageRecord, Payload};

    fn record(id: &str, secs: i64) -> MessageRecord {
        MessageRecord {
            id: MessageId::from(id),
            sender_id: UserId::from("u2"),
            receiver_id: UserId::from("u1"),
            payload: Payload::from(id),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn newest_first_becomes_chronological() {
        let api = MockApi::new();
        api.add_session("tok", "u1");
        api.set_history("u2", vec![record("m3", 30), record("m2", 20), record("m1", 10)]);

        let loader = HistoryLoader::new(Arc::new(api));
        let messages = loader
            .load(&SessionToken::new("tok"), &UserId::from("u2"))
            .await
            .unwrap();

        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2", "m3"]);
        assert!(messages.iter().all(|m| m.is_confirmed()));
    }

    #[tokio::test]
    async fn snapshot_returns_chat_rows() {
        let api = MockApi::new();
        api.add_session("tok", "u1");
        api.set_chats(vec![ChatSummary {
            partner_id: UserId::from("u2"),
            display_name: "Bob".into(),
            last_message_preview: "hey".into(),
            last_message_at: Utc.timestamp_opt(10, 0).unwrap(),
        }]);

        let loader = HistoryLoader::new(Arc::new(api));
        let chats = loader.snapshot(&SessionToken::new("tok")).await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].display_name, "Bob");
    }

    #[tokio::test]
    async fn rejected_token_is_auth_error() {
        let api = MockApi::new();
        let loader = HistoryLoader::new(Arc::new(api));
        let err = loader.snapshot(&SessionToken::new("nope")).await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn empty_history_is_empty() {
        let api = MockApi::new();
        api.add_session("tok", "u1");

        let loader = HistoryLoader::new(Arc::new(api));
        let messages = loader
            .load(&SessionToken::new("tok"), &UserId::from("u9"))
            .await
            .unwrap();
        assert!(messages.is_empty());
    }
}
