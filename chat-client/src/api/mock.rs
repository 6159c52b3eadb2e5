//! Mock API for testing.
//!
//! Serves an in-memory set of users, chats and histories, records every
//! call, and lets tests force failures on the next call to an endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use parley_chat_types::{ChatSummary, MessageRecord, UserId, UserRecord};

use super::ChatApi;
use crate::credentials::SessionToken;
use crate::ChatError;

/// Endpoints of [`ChatApi`], for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `/api/me`
    CurrentUser,
    /// `/api/chats`
    Chats,
    /// `/api/messages/{partner}`
    Messages,
    /// `/api/users/{id}`
    User,
    /// `/api/users?username=`
    UserByName,
}

/// In-memory [`ChatApi`].
///
/// Clones share state.
#[derive(Debug, Default, Clone)]
pub struct MockApi {
    inner: Arc<Mutex<MockApiInner>>,
}

#[derive(Debug, Default)]
struct MockApiInner {
    /// Token → user it belongs to. Unknown tokens get 401.
    sessions: HashMap<String, UserId>,
    users: Vec<UserRecord>,
    chats: Vec<ChatSummary>,
    /// Partner → history, stored newest first like the server returns it.
    histories: HashMap<UserId, Vec<MessageRecord>>,
    failures: HashMap<Endpoint, ChatError>,
    calls: Vec<Endpoint>,
}

impl MockApi {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockApiInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a user.
    pub fn add_user(&self, id: impl Into<UserId>, username: &str) {
        self.lock().users.push(UserRecord {
            id: id.into(),
            username: username.to_string(),
        });
    }

    /// Accept `token` as belonging to `user`.
    pub fn add_session(&self, token: &str, user: impl Into<UserId>) {
        self.lock().sessions.insert(token.to_string(), user.into());
    }

    /// Revoke every token, so every following call returns an auth error.
    pub fn revoke_sessions(&self) {
        self.lock().sessions.clear();
    }

    /// Replace the chat list.
    pub fn set_chats(&self, chats: Vec<ChatSummary>) {
        self.lock().chats = chats;
    }

    /// Replace a partner's history. `newest_first` is returned as given.
    pub fn set_history(&self, partner: impl Into<UserId>, newest_first: Vec<MessageRecord>) {
        self.lock().histories.insert(partner.into(), newest_first);
    }

    /// Make the next call to `endpoint` fail with `error`.
    pub fn fail_next(&self, endpoint: Endpoint, error: ChatError) {
        self.lock().failures.insert(endpoint, error);
    }

    /// Number of calls made to `endpoint`.
    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.lock().calls.iter().filter(|c| **c == endpoint).count()
    }

    fn begin(&self, endpoint: Endpoint, token: &SessionToken) -> Result<MutexGuard<'_, MockApiInner>, ChatError> {
        let mut inner = self.lock();
        inner.calls.push(endpoint);
        if let Some(error) = inner.failures.remove(&endpoint) {
            return Err(error);
        }
        if !inner.sessions.contains_key(token.expose()) {
            return Err(ChatError::Auth("401 Unauthorized".into()));
        }
        Ok(inner)
    }
}

#[async_trait]
impl ChatApi for MockApi {
    async fn current_user(&self, token: &SessionToken) -> Result<UserRecord, ChatError> {
        let inner = self.begin(Endpoint::CurrentUser, token)?;
        let id = inner
            .sessions
            .get(token.expose())
            .cloned()
            .ok_or_else(|| ChatError::Auth("401 Unauthorized".into()))?;
        inner
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| ChatError::NotFound(format!("user {id}")))
    }

    async fn chats(&self, token: &SessionToken) -> Result<Vec<ChatSummary>, ChatError> {
        let inner = self.begin(Endpoint::Chats, token)?;
        Ok(inner.chats.clone())
    }

    async fn messages(
        &self,
        token: &SessionToken,
        partner: &UserId,
    ) -> Result<Vec<MessageRecord>, ChatError> {
        let inner = self.begin(Endpoint::Messages, token)?;
        Ok(inner.histories.get(partner).cloned().unwrap_or_default())
    }

    async fn user(&self, token: &SessionToken, id: &UserId) -> Result<UserRecord, ChatError> {
        let inner = self.begin(Endpoint::User, token)?;
        inner
            .users
            .iter()
            .find(|u| &u.id == id)
            .cloned()
            .ok_or_else(|| ChatError::NotFound(format!("user {id}")))
    }

    async fn user_by_name(
        &self,
        token: &SessionToken,
        username: &str,
    ) -> Result<UserRecord, ChatError> {
        let inner = self.begin(Endpoint::UserByName, token)?;
        inner
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| ChatError::NotFound(format!("user {username:?}")))
    }
}
