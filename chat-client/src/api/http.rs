//! HttpApi - the request/response API over reqwest.

use async_trait::async_trait;
use parley_chat_types::{ChatSummary, MessageRecord, UserId, UserRecord};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::ChatApi;
use crate::config::ClientConfig;
use crate::credentials::SessionToken;
use crate::ChatError;

/// HTTP client for the chat server.
///
/// Every request is bounded by the configured timeout; an expired timeout
/// is reported as [`ChatError::TransientNetwork`].
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: Url,
}

impl HttpApi {
    /// Build a client from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ChatError::Config(e.to_string()))?;
        if config.server.base_url.cannot_be_a_base() {
            return Err(ChatError::Config(format!(
                "{} cannot be used as a base url",
                config.server.base_url
            )));
        }
        Ok(Self {
            client,
            base_url: config.server.base_url.clone(),
        })
    }

    /// `<base>/api/<segments...>`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ChatError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ChatError::Config(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        token: &SessionToken,
        url: Url,
        context: &str,
    ) -> Result<R, ChatError> {
        debug!(url = %url, "GET");
        let response = self
            .client
            .get(url)
            .bearer_auth(token.expose())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::from_status(status, context));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ChatError::Protocol(format!("{context}: {e}")))
    }
}

#[async_trait]
impl ChatApi for HttpApi {
    async fn current_user(&self, token: &SessionToken) -> Result<UserRecord, ChatError> {
        let url = self.endpoint(&["me"])?;
        self.get_json(token, url, "current user").await
    }

    async fn chats(&self, token: &SessionToken) -> Result<Vec<ChatSummary>, ChatError> {
        let url = self.endpoint(&["chats"])?;
        // The server encodes an empty list as `null`.
        let chats: Option<Vec<ChatSummary>> = self.get_json(token, url, "chat list").await?;
        Ok(chats.unwrap_or_default())
    }

    async fn messages(
        &self,
        token: &SessionToken,
        partner: &UserId,
    ) -> Result<Vec<MessageRecord>, ChatError> {
        let url = self.endpoint(&["messages", partner.as_str()])?;
        let context = format!("messages with {partner}");
        let messages: Option<Vec<MessageRecord>> = self.get_json(token, url, &context).await?;
        Ok(messages.unwrap_or_default())
    }

    async fn user(&self, token: &SessionToken, id: &UserId) -> Result<UserRecord, ChatError> {
        let url = self.endpoint(&["users", id.as_str()])?;
        self.get_json(token, url, &format!("user {id}")).await
    }

    async fn user_by_name(
        &self,
        token: &SessionToken,
        username: &str,
    ) -> Result<UserRecord, ChatError> {
        let mut url = self.endpoint(&["users"])?;
        url.query_pairs_mut().append_pair("username", username);
        self.get_json(token, url, &format!("user {username:?}")).await
    }
}
