//! Log in with a session token.

use anyhow::{bail, Context, Result};
use parley_chat_client::{ChatApi, SessionToken, SyncOrchestrator, TokenStore, Transport};

/// Run the login command.
pub async fn run<A: ChatApi, T: Transport, S: TokenStore>(
    chat: &mut SyncOrchestrator<A, T, S>,
    token: &str,
) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        bail!("Token is empty");
    }

    let result = chat.authenticate(SessionToken::new(token)).await;
    if let Err(e) = result {
        // The token was accepted and saved, only the chat list failed.
        if chat.session_state().is_authenticated() {
            eprintln!("Warning: could not load conversations: {e}");
        } else {
            return Err(e).context("Login failed");
        }
    }

    let name = chat.local_username().unwrap_or("unknown");
    let id = chat
        .local_user()
        .map(ToString::to_string)
        .unwrap_or_default();
    println!("Logged in as {name} ({id})");
    println!("  Conversations: {}", chat.conversations().len());

    chat.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::demo_client;
    use crate::mock::DEMO_TOKEN;
    use parley_chat_client::{ChatError, MemoryTokenStore};

    #[tokio::test(start_paused = true)]
    async fn login_persists_session() {
        let tokens = MemoryTokenStore::new();
        let mut chat = demo_client(&tokens);

        run(&mut chat, DEMO_TOKEN).await.unwrap();
        assert_eq!(tokens.load().unwrap().unwrap().token.expose(), DEMO_TOKEN);
        assert!(!chat.is_online());
    }

    #[tokio::test(start_paused = true)]
    async fn bad_token_fails_and_saves_nothing() {
        let tokens = MemoryTokenStore::new();
        let mut chat = demo_client(&tokens);

        let err = run(&mut chat, "wrong").await.unwrap_err();
        assert!(err.downcast_ref::<ChatError>().is_some_and(ChatError::is_auth));
        assert!(tokens.load().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_token_is_rejected() {
        let mut chat = demo_client(&MemoryTokenStore::new());
        assert!(run(&mut chat, "  ").await.is_err());
    }
}
