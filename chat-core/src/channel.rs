//! Push channel state machine for Parley.
//!
//! This module provides a pure, side-effect-free state machine for the
//! lifecycle of the push connection. It takes events as input and produces a
//! new state plus a list of actions to execute.
//!
//! The actual I/O (opening the socket, sleeping, forwarding frames) is
//! performed by chat-client, not by this module.
//!
//! Reconnection uses a fixed delay and retries forever: every abnormal
//! closure schedules exactly one attempt.

use std::time::Duration;

/// Reconnection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Wait between a closure and the next connection attempt.
    pub delay: Duration,
}

impl ReconnectPolicy {
    /// Default reconnect delay.
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);

    /// Policy with a fixed delay.
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(Self::DEFAULT_DELAY)
    }
}

/// Channel state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    /// Not connected and not trying to be.
    Closed,
    /// Connection attempt in progress.
    Connecting {
        /// Attempts since the channel was last open (0 for the first open).
        attempt: u32,
    },
    /// Connected; frames flow.
    Open,
    /// Waiting for the reconnect timer.
    Reconnecting {
        /// Attempts since the channel was last open.
        attempt: u32,
    },
}

impl ChannelState {
    /// Create a new state machine in the Closed state.
    pub fn new() -> Self {
        Self::Closed
    }

    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: ChannelEvent, policy: &ReconnectPolicy) -> (Self, Vec<ChannelAction>) {
        match (self, event) {
            // From Closed
            (Self::Closed, ChannelEvent::OpenRequested) => {
                (Self::Connecting { attempt: 0 }, vec![ChannelAction::Connect])
            }

            // From Connecting
            (Self::Connecting { attempt }, ChannelEvent::ConnectSucceeded) => (
                Self::Open,
                vec![ChannelAction::Emit(ChannelNotice::Opened {
                    reconnect: attempt > 0,
                })],
            ),
            (Self::Connecting { attempt }, ChannelEvent::ConnectFailed { error }) => {
                let next = attempt.saturating_add(1);
                (
                    Self::Reconnecting { attempt: next },
                    vec![
                        ChannelAction::Emit(ChannelNotice::Closed {
                            reason: error,
                            attempt: next,
                        }),
                        ChannelAction::StartReconnectTimer {
                            delay: policy.delay,
                        },
                    ],
                )
            }
            (Self::Connecting { .. }, ChannelEvent::CloseRequested) => {
                (Self::Closed, vec![ChannelAction::Disconnect])
            }

            // From Open
            (Self::Open, ChannelEvent::FrameReceived { frame }) => {
                (Self::Open, vec![ChannelAction::Deliver { frame }])
            }
            (Self::Open, ChannelEvent::ConnectionLost { reason }) => (
                Self::Reconnecting { attempt: 1 },
                vec![
                    ChannelAction::Emit(ChannelNotice::Closed { reason, attempt: 1 }),
                    ChannelAction::StartReconnectTimer {
                        delay: policy.delay,
                    },
                ],
            ),
            (Self::Open, ChannelEvent::CloseRequested) => {
                (Self::Closed, vec![ChannelAction::Disconnect])
            }

            // From Reconnecting
            (Self::Reconnecting { attempt }, ChannelEvent::ReconnectTimer) => {
                (Self::Connecting { attempt }, vec![ChannelAction::Connect])
            }
            (Self::Reconnecting { .. }, ChannelEvent::CloseRequested) => {
                (Self::Closed, vec![ChannelAction::CancelReconnect])
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if frames can be sent.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Check if currently trying to connect.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting { .. } | Self::Reconnecting { .. })
    }
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur in the channel lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Caller asked for the channel to open.
    OpenRequested,
    /// Transport connection succeeded.
    ConnectSucceeded,
    /// Transport connection failed.
    ConnectFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Text frame received.
    FrameReceived {
        /// Raw frame text.
        frame: String,
    },
    /// Open connection closed abnormally (network loss, server close, error).
    ConnectionLost {
        /// Reason for the closure.
        reason: String,
    },
    /// Reconnect timer fired.
    ReconnectTimer,
    /// Caller asked for the channel to close.
    CloseRequested,
}

/// Actions to be executed by chat-client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelAction {
    /// Open the transport connection.
    Connect,
    /// Close the transport connection.
    Disconnect,
    /// Hand a received frame to the consumer.
    Deliver {
        /// Raw frame text.
        frame: String,
    },
    /// Schedule one reconnection attempt.
    StartReconnectTimer {
        /// Delay before the attempt.
        delay: Duration,
    },
    /// Cancel the pending reconnect timer.
    CancelReconnect,
    /// Report a lifecycle change to the consumer.
    Emit(ChannelNotice),
}

/// Lifecycle changes reported to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelNotice {
    /// The channel is open.
    Opened {
        /// Whether this follows an abnormal closure.
        reconnect: bool,
    },
    /// The channel closed abnormally; a reconnect is scheduled.
    Closed {
        /// Reason for the closure.
        reason: String,
        /// Attempt number of the scheduled reconnect.
        attempt: u32,
    },
}
