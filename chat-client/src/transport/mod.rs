//! Transport abstraction for the Parley push channel.
//!
//! This module provides a pluggable transport layer that abstracts the
//! underlying connection mechanism (WebSocket, mock for testing).
//!
//! # Design
//!
//! The transport trait is async and connection-oriented:
//! - `connect()` establishes a connection (the token is already in the URL)
//! - `send()` transmits one JSON text frame
//! - `recv()` waits for the next text frame or the end of the connection
//! - `close()` gracefully terminates
//!
//! `send` and `recv` may run concurrently on the same transport. The
//! reconnect policy lives above this layer, in [`crate::PushChannel`].

mod mock;
mod ws;

pub use mock::MockTransport;
pub use ws::WsTransport;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

/// Transport trait for the push channel's text frames.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Connect to the push endpoint. Replaces any existing connection.
    async fn connect(&self, url: &Url) -> Result<(), TransportError>;

    /// Send one text frame.
    async fn send(&self, frame: &str) -> Result<(), TransportError>;

    /// Receive the next text frame.
    ///
    /// Waits until a frame arrives or the connection ends. Returns
    /// [`TransportError::ConnectionClosed`] on a clean close.
    async fn recv(&self) -> Result<String, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}
