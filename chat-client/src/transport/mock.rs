//! Mock transport for testing.
//!
//! Allows pushing inbound frames, dropping the connection, and capturing
//! sent frames and connection attempts for verification.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;
use url::Url;

use super::{Transport, TransportError};

/// Mock transport for testing.
///
/// Clones share state, so a test keeps one handle while the channel driver
/// owns another.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    wake: Arc<Notify>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    /// Bumped on every successful connect; a pending `recv` from an older
    /// connection sees the change and ends.
    generation: u64,
    connect_attempts: usize,
    connected_urls: Vec<Url>,
    sent_frames: Vec<String>,
    receive_queue: VecDeque<String>,
    drop_pending: bool,
    fail_connects: usize,
    fail_next_send: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        // A panic while holding the lock only happens in a failing test.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue an inbound frame for the current (or next) connection.
    pub fn push_frame(&self, frame: impl Into<String>) {
        self.lock().receive_queue.push_back(frame.into());
        self.wake.notify_waiters();
    }

    /// Simulate an abnormal closure (network loss or server close).
    ///
    /// A pending `recv` returns [`TransportError::ConnectionClosed`].
    pub fn drop_connection(&self) {
        {
            let mut inner = self.lock();
            if inner.connected {
                inner.drop_pending = true;
            }
        }
        self.wake.notify_waiters();
    }

    /// Cause the next `count` connect() calls to fail.
    pub fn fail_connects(&self, count: usize) {
        self.lock().fail_connects = count;
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.lock().fail_next_send = Some(error.to_string());
    }

    /// All frames that were sent.
    pub fn sent_frames(&self) -> Vec<String> {
        self.lock().sent_frames.clone()
    }

    /// The last frame that was sent.
    pub fn last_sent(&self) -> Option<String> {
        self.lock().sent_frames.last().cloned()
    }

    /// Number of connect() calls, failed ones included.
    pub fn connect_attempts(&self) -> usize {
        self.lock().connect_attempts
    }

    /// URLs of successful connections, oldest first.
    pub fn connected_urls(&self) -> Vec<Url> {
        self.lock().connected_urls.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &Url) -> Result<(), TransportError> {
        {
            let mut inner = self.lock();
            inner.connect_attempts += 1;

            // Check for forced failure
            if inner.fail_connects > 0 {
                inner.fail_connects -= 1;
                return Err(TransportError::ConnectionFailed("refused".into()));
            }

            inner.connected = true;
            inner.generation += 1;
            inner.drop_pending = false;
            inner.connected_urls.push(url.clone());
        }
        self.wake.notify_waiters();
        Ok(())
    }

    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        let mut inner = self.lock();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_frames.push(frame.to_string());
        Ok(())
    }

    async fn recv(&self) -> Result<String, TransportError> {
        let generation = {
            let inner = self.lock();
            if !inner.connected {
                return Err(TransportError::NotConnected);
            }
            inner.generation
        };

        loop {
            // Register interest before checking state so a notify between
            // the check and the await is not lost.
            let notified = self.wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.lock();
                if !inner.connected || inner.generation != generation {
                    return Err(TransportError::ConnectionClosed);
                }
                if inner.drop_pending {
                    inner.drop_pending = false;
                    inner.connected = false;
                    return Err(TransportError::ConnectionClosed);
                }
                if let Some(frame) = inner.receive_queue.pop_front() {
                    return Ok(frame);
                }
            }

            notified.await;
        }
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.lock().connected = false;
        self.wake.notify_waiters();
        Ok(())
    }
}
