//! Start a conversation with a user.

use anyhow::{Context, Result};
use parley_chat_client::{ChatApi, SyncOrchestrator, TokenStore, Transport};

use super::require_session;

/// Run the new-chat command.
pub async fn run<A: ChatApi, T: Transport, S: TokenStore>(
    chat: &mut SyncOrchestrator<A, T, S>,
    username: &str,
) -> Result<()> {
    require_session(chat).await?;
    let partner = chat
        .start_chat(username)
        .await
        .with_context(|| format!("Could not start a chat with {username:?}"))?;
    println!("Chat with {username} ({partner}) is ready.");
    println!("Send with: parley send {username} <message>");

    chat.shutdown().await;
    Ok(())
}
