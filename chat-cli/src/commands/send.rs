//! Send a message.

use anyhow::{bail, Result};
use parley_chat_core::Reconciliation;
use parley_chat_client::{ChatApi, SyncOrchestrator, SyncUpdate, TokenStore, Transport};
use std::time::Duration;
use tokio::time::Instant;

use super::{require_session, resolve_partner, wait_online};

/// Run the send command.
///
/// Waits up to `wait` for the channel to open and again for the server to
/// echo the message back.
pub async fn run<A: ChatApi, T: Transport, S: TokenStore>(
    chat: &mut SyncOrchestrator<A, T, S>,
    partner: &str,
    text: &str,
    wait: Duration,
) -> Result<()> {
    require_session(chat).await?;
    let partner = resolve_partner(chat, partner).await?;
    if !wait_online(chat, wait).await {
        eprintln!("Warning: push channel is not connected");
    }

    let placeholder = chat.send_message(&partner, text).await?;
    let deadline = Instant::now() + wait;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, chat.next_update()).await {
            Ok(Some(SyncUpdate::Message(Reconciliation::Confirmed {
                placeholder: id,
                message_id,
                ..
            }))) if id == placeholder.id => {
                println!("Delivered ({message_id})");
                break;
            }
            Ok(Some(SyncUpdate::SendFailed {
                placeholder: id,
                error,
                ..
            })) if id == placeholder.id => {
                chat.shutdown().await;
                bail!("Message not sent: {error}");
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                println!("Sent; not yet confirmed by the server.");
                break;
            }
        }
    }

    chat.shutdown().await;
    Ok(())
}
