//! CLI command implementations.
//!
//! Every command takes an orchestrator generic over its backend, so the same
//! code runs against a real server and against the `--mock` demo backend.

pub mod chats;
pub mod history;
pub mod login;
pub mod logout;
pub mod new_chat;
pub mod send;
pub mod watch;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use parley_chat_client::{ChatApi, SyncOrchestrator, SyncUpdate, TokenStore, Transport};
use parley_chat_core::SessionState;
use parley_chat_types::UserId;
use std::time::Duration;

/// How long to let background name lookups and channel events land.
pub const SETTLE: Duration = Duration::from_millis(300);

/// Resume the persisted session or fail with a hint.
pub async fn require_session<A: ChatApi, T: Transport, S: TokenStore>(
    chat: &mut SyncOrchestrator<A, T, S>,
) -> Result<()> {
    let resumed = chat.resume().await.context("Failed to load conversations")?;
    if !resumed {
        bail!("Not logged in. Run 'parley login --token <token>' first.");
    }
    settle(chat, SETTLE).await;
    Ok(())
}

/// Process updates until none arrive for `quiet`.
pub async fn settle<A: ChatApi, T: Transport, S: TokenStore>(
    chat: &mut SyncOrchestrator<A, T, S>,
    quiet: Duration,
) -> Vec<SyncUpdate> {
    let mut updates = Vec::new();
    while let Ok(Some(update)) = tokio::time::timeout(quiet, chat.next_update()).await {
        updates.push(update);
    }
    updates
}

/// Wait up to `limit` for the session to go live.
pub async fn wait_online<A: ChatApi, T: Transport, S: TokenStore>(
    chat: &mut SyncOrchestrator<A, T, S>,
    limit: Duration,
) -> bool {
    let wait = async {
        while chat.session_state() != SessionState::Live {
            if chat.next_update().await.is_none() {
                return false;
            }
        }
        true
    };
    tokio::time::timeout(limit, wait).await.unwrap_or(false)
}

/// Find a partner by id or display name, or start a chat by username.
pub async fn resolve_partner<A: ChatApi, T: Transport, S: TokenStore>(
    chat: &mut SyncOrchestrator<A, T, S>,
    who: &str,
) -> Result<UserId> {
    let id = UserId::from(who);
    if chat.conversation(&id).is_some() {
        return Ok(id);
    }
    if let Some(conversation) = chat.conversations().into_iter().find(|c| c.label() == who) {
        return Ok(conversation.partner_id().clone());
    }
    chat.start_chat(who)
        .await
        .with_context(|| format!("No conversation or user named {who:?}"))
}

/// Format a timestamp in local time.
pub fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}
