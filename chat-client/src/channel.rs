//! PushChannel - the live message connection.
//!
//! Drives the pure [`ChannelState`] machine from chat-core in a background
//! task: executes its actions against a [`Transport`], turns transport
//! results back into events, and forwards frames and lifecycle changes to
//! the owner over an mpsc channel.
//!
//! ```text
//! Orchestrator ←(ChannelUpdate)── driver task ──→ Transport → Network
//!                                     ↓
//!                        chat-core ChannelState (pure)
//! ```
//!
//! The reconnect timer is part of the driver task, so closing the channel
//! cancels it with the task.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parley_chat_core::{ChannelAction, ChannelEvent, ChannelNotice, ChannelState, ReconnectPolicy};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::transport::{Transport, TransportError};

/// What the channel reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelUpdate {
    /// The connection is up.
    Opened {
        /// Whether this follows an abnormal closure.
        reconnect: bool,
    },
    /// A text frame arrived.
    Frame(String),
    /// The connection closed abnormally; one reconnect is scheduled.
    Closed {
        /// Reason for the closure.
        reason: String,
        /// Attempt number of the scheduled reconnect.
        attempt: u32,
    },
}

/// Owner handle for the push connection.
pub struct PushChannel<T: Transport> {
    transport: Arc<T>,
    policy: ReconnectPolicy,
    open: Arc<AtomicBool>,
    task_handle: Option<JoinHandle<()>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl<T: Transport> PushChannel<T> {
    /// Create a closed channel over `transport`.
    pub fn new(transport: T, policy: ReconnectPolicy) -> Self {
        Self {
            transport: Arc::new(transport),
            policy,
            open: Arc::new(AtomicBool::new(false)),
            task_handle: None,
            shutdown_tx: None,
        }
    }

    /// Start connecting to `url` in a background task.
    ///
    /// The connection is retried forever with the policy's fixed delay until
    /// [`close`](Self::close) is called. Any previous driver is stopped first.
    pub async fn open(&mut self, url: Url, updates: mpsc::Sender<ChannelUpdate>) {
        self.close().await;

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        let driver = Driver {
            transport: Arc::clone(&self.transport),
            url,
            policy: self.policy,
            open: Arc::clone(&self.open),
            updates,
            shutdown_rx,
        };
        self.task_handle = Some(tokio::spawn(driver.run()));
    }

    /// Send one frame.
    ///
    /// Fails with [`TransportError::NotConnected`] while the channel is not
    /// open. Nothing is queued for later delivery.
    pub async fn send(&self, frame: &str) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotConnected);
        }
        self.transport.send(frame).await
    }

    /// Stop the driver, cancelling any pending reconnect, and close the
    /// transport. Returns once the driver has exited, so no further
    /// updates are sent after this.
    pub async fn close(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }
        self.open.store(false, Ordering::SeqCst);
    }

    /// Whether frames can be sent right now.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Whether a driver task is running (open or reconnecting).
    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> Drop for PushChannel<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

struct Driver<T: Transport> {
    transport: Arc<T>,
    url: Url,
    policy: ReconnectPolicy,
    open: Arc<AtomicBool>,
    updates: mpsc::Sender<ChannelUpdate>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl<T: Transport> Driver<T> {
    async fn run(mut self) {
        let mut state = ChannelState::new();
        let mut events = VecDeque::from([ChannelEvent::OpenRequested]);

        loop {
            let event = match events.pop_front() {
                Some(event) => event,
                None if state.is_open() => self.next_frame().await,
                None => break,
            };

            let (next, actions) = state.on_event(event, &self.policy);
            state = next;

            for action in actions {
                if let Some(event) = self.execute(action).await {
                    events.push_back(event);
                }
            }

            if matches!(state, ChannelState::Closed) && events.is_empty() {
                break;
            }
        }

        self.open.store(false, Ordering::SeqCst);
        debug!("push channel driver stopped");
    }

    async fn execute(&mut self, action: ChannelAction) -> Option<ChannelEvent> {
        match action {
            ChannelAction::Connect => {
                info!(url = %redacted(&self.url), "connecting push channel");
                tokio::select! {
                    result = self.transport.connect(&self.url) => Some(match result {
                        Ok(()) => ChannelEvent::ConnectSucceeded,
                        Err(e) => ChannelEvent::ConnectFailed { error: e.to_string() },
                    }),
                    _ = self.shutdown_rx.recv() => Some(ChannelEvent::CloseRequested),
                }
            }
            ChannelAction::Disconnect => {
                self.open.store(false, Ordering::SeqCst);
                if let Err(e) = self.transport.close().await {
                    debug!(error = %e, "error closing transport");
                }
                None
            }
            ChannelAction::Deliver { frame } => self.notify(ChannelUpdate::Frame(frame)).await,
            ChannelAction::StartReconnectTimer { delay } => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => Some(ChannelEvent::ReconnectTimer),
                    _ = self.shutdown_rx.recv() => {
                        info!("push channel closed during reconnect wait");
                        Some(ChannelEvent::CloseRequested)
                    }
                }
            }
            // The timer lives inside StartReconnectTimer's select.
            ChannelAction::CancelReconnect => None,
            ChannelAction::Emit(ChannelNotice::Opened { reconnect }) => {
                self.open.store(true, Ordering::SeqCst);
                info!(reconnect, "push channel open");
                self.notify(ChannelUpdate::Opened { reconnect }).await
            }
            ChannelAction::Emit(ChannelNotice::Closed { reason, attempt }) => {
                self.open.store(false, Ordering::SeqCst);
                warn!(
                    reason = %reason,
                    attempt,
                    delay_ms = self.policy.delay.as_millis() as u64,
                    "push channel closed, reconnecting"
                );
                self.notify(ChannelUpdate::Closed { reason, attempt }).await
            }
        }
    }

    async fn next_frame(&mut self) -> ChannelEvent {
        tokio::select! {
            result = self.transport.recv() => match result {
                Ok(frame) => ChannelEvent::FrameReceived { frame },
                Err(e) => ChannelEvent::ConnectionLost { reason: e.to_string() },
            },
            _ = self.shutdown_rx.recv() => ChannelEvent::CloseRequested,
        }
    }

    /// Forward an update. A dropped owner or a shutdown while the owner's
    /// queue is full both close the channel.
    async fn notify(&mut self, update: ChannelUpdate) -> Option<ChannelEvent> {
        tokio::select! {
            result = self.updates.send(update) => match result {
                Ok(()) => None,
                Err(_) => Some(ChannelEvent::CloseRequested),
            },
            _ = self.shutdown_rx.recv() => Some(ChannelEvent::CloseRequested),
        }
    }
}

/// The URL without its query, which carries the session token.
fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}
