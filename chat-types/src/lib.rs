//! # chat-types
//!
//! Wire format types for the Parley messaging client.
//!
//! This crate provides the foundational types used across all Parley crates:
//! - [`UserId`], [`MessageId`] - Identity types
//! - [`Envelope`] - Push channel frame (inbound and outbound)
//! - [`ChatSummary`], [`MessageRecord`], [`UserRecord`] - HTTP response records
//! - [`Payload`] - Message body with the server's byte encoding
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod envelope;
mod error;
mod ids;
mod messages;
mod payload;

pub use envelope::Envelope;
pub use error::WireError;
pub use ids::{MessageId, UserId, PLACEHOLDER_PREFIX};
pub use messages::{ChatSummary, MessageRecord, UserRecord};
pub use payload::Payload;
