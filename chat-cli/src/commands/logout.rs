//! Log out and forget the session.

use anyhow::{Context, Result};
use parley_chat_client::{ChatApi, SyncOrchestrator, TokenStore, Transport};

/// Run the logout command.
pub async fn run<A: ChatApi, T: Transport, S: TokenStore>(
    chat: &mut SyncOrchestrator<A, T, S>,
) -> Result<()> {
    chat.logout().await.context("Failed to clear session")?;
    println!("Logged out.");
    Ok(())
}
