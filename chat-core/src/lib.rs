//! # chat-core
//!
//! Pure logic for Parley (no I/O, instant tests).
//!
//! This crate implements the conversation store, the reconciliation
//! algorithm and the connection/session state machines without any network
//! or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. The state machines return actions rather than
//! performing them; the actual I/O (HTTP fetches, the push connection, token
//! persistence) is performed by `chat-client`, which interprets those actions
//! and is the single writer of the [`ConversationStore`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod conversation;
pub mod message;
pub mod reconcile;
pub mod session;
pub mod store;

pub use channel::{ChannelAction, ChannelEvent, ChannelNotice, ChannelState, ReconnectPolicy};
pub use conversation::{Conversation, DisplayName, Summary};
pub use message::Message;
pub use reconcile::{HistoryOutcome, ReconcileError, Reconciler, Reconciliation};
pub use session::{SessionAction, SessionEvent, SessionNotice, SessionState};
pub use store::{AppendOutcome, ConversationStore, StoreError};
