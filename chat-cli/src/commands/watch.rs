//! Follow live messages until interrupted.

use anyhow::{bail, Context, Result};
use parley_chat_core::Reconciliation;
use parley_chat_client::{ChatApi, SyncOrchestrator, SyncUpdate, TokenStore, Transport};
use std::future::Future;

use super::format_time;

/// Run the watch command until Ctrl-C.
pub async fn run<A: ChatApi, T: Transport, S: TokenStore>(
    chat: &mut SyncOrchestrator<A, T, S>,
) -> Result<()> {
    watch(chat, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

/// Print updates until `stop` completes or the session ends.
pub async fn watch<A: ChatApi, T: Transport, S: TokenStore>(
    chat: &mut SyncOrchestrator<A, T, S>,
    stop: impl Future<Output = ()>,
) -> Result<()> {
    let resumed = chat.resume().await.context("Failed to load conversations")?;
    if !resumed {
        bail!("Not logged in. Run 'parley login --token <token>' first.");
    }
    println!("Watching for messages. Press Ctrl-C to stop.");

    tokio::pin!(stop);
    loop {
        tokio::select! {
            update = chat.next_update() => {
                let Some(update) = update else { break };
                if let Some(line) = describe(chat, &update) {
                    println!("{line}");
                }
                if matches!(update, SyncUpdate::LoggedOut { .. }) {
                    break;
                }
            }
            _ = &mut stop => break,
        }
    }

    chat.shutdown().await;
    Ok(())
}

/// One display line for an update, if it is worth showing.
pub fn describe<A: ChatApi, T: Transport, S: TokenStore>(
    chat: &SyncOrchestrator<A, T, S>,
    update: &SyncUpdate,
) -> Option<String> {
    match update {
        SyncUpdate::Message(Reconciliation::Appended {
            partner,
            message_id,
            ..
        }) => {
            let conversation = chat.conversation(partner)?;
            let message = conversation
                .messages()
                .iter()
                .find(|m| &m.id == message_id)?;
            let from_me = Some(&message.sender_id) == chat.local_user();
            let who = if from_me {
                format!("you -> {}", conversation.label())
            } else {
                conversation.label().to_string()
            };
            Some(format!(
                "[{}] {}: {}",
                format_time(message.created_at),
                who,
                message.payload
            ))
        }
        SyncUpdate::Message(Reconciliation::Confirmed { partner, .. }) => {
            let label = chat.conversation(partner).map(|c| c.label())?;
            Some(format!("   delivered to {label}"))
        }
        SyncUpdate::Connectivity { online: true } => Some("-- connected --".into()),
        SyncUpdate::Connectivity { online: false } => {
            Some("-- connection lost, reconnecting --".into())
        }
        SyncUpdate::SendFailed { partner, error, .. } => {
            Some(format!("!! message to {partner} not sent: {error}"))
        }
        SyncUpdate::SnapshotFailed { error } => {
            Some(format!("!! could not load conversations: {error}"))
        }
        SyncUpdate::LoggedOut { forced: true } => {
            Some("-- session rejected by the server, logged out --".into())
        }
        SyncUpdate::LoggedOut { forced: false } => Some("-- logged out --".into()),
        _ => None,
    }
}
