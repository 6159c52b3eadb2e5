//! # parley
//!
//! Command-line client for Parley.
//!
//! ## Commands
//!
//! - `login`: Store a session token and load conversations
//! - `logout`: Forget the session
//! - `chats`: List conversations, most recent first
//! - `history`: Show a conversation
//! - `send`: Send a message
//! - `new-chat`: Start a conversation with a user
//! - `watch`: Follow live messages
//!
//! ## Example
//!
//! ```bash
//! # Log in with a token issued by the server
//! parley --server https://chat.example.com login --token "$TOKEN"
//!
//! # See who you have been talking to
//! parley chats
//!
//! # Talk
//! parley send bob "running late"
//! parley watch
//!
//! # Try it without a server
//! parley --mock login --token demo-token
//! parley --mock watch
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parley_chat_client::{
    ChatApi, FileTokenStore, HttpApi, SyncOrchestrator, TokenStore, Transport, WsTransport,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

mod commands;
mod config;
mod mock;

use commands::{chats, history, login, logout, new_chat, send, watch};
use config::Settings;

/// Command-line client for Parley.
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the session file and config.toml
    #[arg(long, global = true, env = "PARLEY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Config file (default: <data_dir>/config.toml if present)
    #[arg(long, global = true, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// Chat server base URL, overriding the config file
    #[arg(long, global = true, env = "PARLEY_SERVER")]
    server: Option<Url>,

    /// Use the built-in offline demo backend instead of a server
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in with a session token
    Login {
        /// Bearer token issued by the server
        #[arg(long, short, env = "PARLEY_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Log out and forget the stored session
    Logout,

    /// List conversations, most recent first
    Chats,

    /// Show the messages in a conversation
    History {
        /// Partner id or username
        partner: String,
    },

    /// Send a message
    Send {
        /// Partner id or username
        partner: String,

        /// Message text
        text: String,

        /// Seconds to wait for the connection and for delivery
        #[arg(long, default_value = "5")]
        wait: u64,
    },

    /// Start a conversation with a user
    NewChat {
        /// Username to look up
        username: String,
    },

    /// Follow live messages until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::resolve(cli.data_dir, cli.config.as_deref(), cli.server)?;
    let tokens = FileTokenStore::in_dir(&settings.data_dir);
    tracing::debug!(
        data_dir = %settings.data_dir.display(),
        server = %settings.client.server.base_url,
        mock = cli.mock,
        "settings resolved"
    );

    if cli.mock {
        let (api, transport) = mock::backend();
        let chat = SyncOrchestrator::new(api, transport, tokens, settings.client)
            .context("Failed to create client")?;
        execute(chat, cli.command).await
    } else {
        let api = HttpApi::new(&settings.client).context("Failed to create HTTP client")?;
        let chat = SyncOrchestrator::new(api, WsTransport::new(), tokens, settings.client)
            .context("Failed to create client")?;
        execute(chat, cli.command).await
    }
}

async fn execute<A: ChatApi, T: Transport, S: TokenStore>(
    mut chat: SyncOrchestrator<A, T, S>,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Login { token } => login::run(&mut chat, &token).await,
        Commands::Logout => logout::run(&mut chat).await,
        Commands::Chats => chats::run(&mut chat).await,
        Commands::History { partner } => history::run(&mut chat, &partner).await,
        Commands::Send {
            partner,
            text,
            wait,
        } => send::run(&mut chat, &partner, &text, Duration::from_secs(wait)).await,
        Commands::NewChat { username } => new_chat::run(&mut chat, &username).await,
        Commands::Watch => watch::run(&mut chat).await,
    }
}
