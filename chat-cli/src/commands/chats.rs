//! List conversations.

use anyhow::Result;
use parley_chat_client::{ChatApi, SyncOrchestrator, TokenStore, Transport};

use super::{format_time, require_session};

/// Run the chats command.
pub async fn run<A: ChatApi, T: Transport, S: TokenStore>(
    chat: &mut SyncOrchestrator<A, T, S>,
) -> Result<()> {
    require_session(chat).await?;

    let conversations = chat.conversations();
    if conversations.is_empty() {
        println!("No conversations yet. Start one with 'parley new-chat <username>'.");
    }
    for conversation in conversations {
        let at = conversation
            .last_message_at()
            .map(format_time)
            .unwrap_or_default();
        println!(
            "{:<20} {:>16}  {}",
            conversation.label(),
            at,
            conversation.last_message_preview().unwrap_or("")
        );
    }

    chat.shutdown().await;
    Ok(())
}
