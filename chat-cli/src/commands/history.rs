//! Show a conversation's history.

use anyhow::{bail, Result};
use parley_chat_client::{ChatApi, SyncOrchestrator, TokenStore, Transport};

use super::{format_time, require_session, resolve_partner, settle, SETTLE};

/// Run the history command.
pub async fn run<A: ChatApi, T: Transport, S: TokenStore>(
    chat: &mut SyncOrchestrator<A, T, S>,
    partner: &str,
) -> Result<()> {
    require_session(chat).await?;
    let partner = resolve_partner(chat, partner).await?;
    chat.select_conversation(&partner).await?;
    settle(chat, SETTLE).await;

    let local = chat.local_user().cloned();
    let Some(conversation) = chat.conversation(&partner) else {
        bail!("Conversation with {partner} is no longer loaded");
    };

    println!("=== {} ===", conversation.label());
    if conversation.messages().is_empty() {
        println!("(no messages)");
    }
    for message in conversation.messages() {
        let who = if Some(&message.sender_id) == local.as_ref() {
            "you"
        } else {
            conversation.label()
        };
        let marker = if message.is_confirmed() { "" } else { " (pending)" };
        println!(
            "[{}] {}: {}{}",
            format_time(message.created_at),
            who,
            message.payload,
            marker
        );
    }

    chat.shutdown().await;
    Ok(())
}
