//! # chat-client
//!
//! Client library for Parley, a one-to-one chat service.
//!
//! This is the main library that applications use to talk to a chat server.
//!
//! ## Features
//!
//! - **Optimistic sends**: a sent message shows up at once as a placeholder
//!   and is swapped for the server's copy when it comes back
//! - **Push channel with reconnect**: one live WebSocket, reopened after a
//!   fixed delay whenever it drops
//! - **Transport and API abstraction**: pluggable push transport (WebSocket,
//!   mock) and HTTP API (reqwest, mock)
//! - **Pure State Machines**: uses chat-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use parley_chat_client::{
//!     ClientConfig, FileTokenStore, HttpApi, SessionToken, SyncOrchestrator, WsTransport,
//! };
//!
//! let config = ClientConfig::default();
//! let api = HttpApi::new(&config)?;
//! let tokens = FileTokenStore::in_dir(&data_dir);
//! let mut chat = SyncOrchestrator::new(api, WsTransport::new(), tokens, config)?;
//!
//! chat.authenticate(SessionToken::new(token)).await?;
//! let bob = chat.start_chat("bob").await?;
//! chat.send_message(&bob, "hi").await?;
//!
//! while let Some(update) = chat.next_update().await {
//!     println!("{update:?}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod channel;
pub mod config;
pub mod credentials;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod transport;

pub use api::{ChatApi, Endpoint, HttpApi, MockApi};
pub use channel::{ChannelUpdate, PushChannel};
pub use config::{ClientConfig, ConfigError, ServerConfig, SyncConfig};
pub use credentials::{FileTokenStore, MemoryTokenStore, SessionToken, StoredSession, TokenStore};
pub use error::ChatError;
pub use history::HistoryLoader;
pub use orchestrator::{SyncOrchestrator, SyncUpdate};
pub use transport::{MockTransport, Transport, TransportError, WsTransport};

pub use parley_chat_core as core;
pub use parley_chat_types as types;
