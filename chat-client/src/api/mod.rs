//! Request/response API.
//!
//! [`ChatApi`] is the seam between the orchestrator and the server's HTTP
//! endpoints: [`HttpApi`] talks to a real server, [`MockApi`] serves canned
//! data in tests and in the CLI's offline mode.

mod http;
mod mock;

pub use http::HttpApi;
pub use mock::{Endpoint, MockApi};

use async_trait::async_trait;
use parley_chat_types::{ChatSummary, MessageRecord, UserId, UserRecord};

use crate::credentials::SessionToken;
use crate::ChatError;

/// The server's request/response endpoints. Every call is bearer-authenticated.
#[async_trait]
pub trait ChatApi: Send + Sync + 'static {
    /// `GET /api/me`: the user the token belongs to.
    async fn current_user(&self, token: &SessionToken) -> Result<UserRecord, ChatError>;

    /// `GET /api/chats`: one summary per conversation (any order).
    async fn chats(&self, token: &SessionToken) -> Result<Vec<ChatSummary>, ChatError>;

    /// `GET /api/messages/{partner}`: history, newest first.
    async fn messages(
        &self,
        token: &SessionToken,
        partner: &UserId,
    ) -> Result<Vec<MessageRecord>, ChatError>;

    /// `GET /api/users/{id}`.
    async fn user(&self, token: &SessionToken, id: &UserId) -> Result<UserRecord, ChatError>;

    /// `GET /api/users?username=`.
    async fn user_by_name(
        &self,
        token: &SessionToken,
        username: &str,
    ) -> Result<UserRecord, ChatError>;
}
