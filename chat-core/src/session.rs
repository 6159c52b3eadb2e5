//! Session state machine.
//!
//! `Unauthenticated → Loading → Degraded ⇄ Live`. Pure like the channel
//! machine: the orchestrator in chat-client feeds events and executes the
//! returned actions.
//!
//! Teardown (logout or a rejected token) always emits the full set of
//! teardown actions, from any state. A stale token next to an empty store
//! is never a reachable combination.

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No token.
    #[default]
    Unauthenticated,
    /// Token known; waiting for (or retrying) the chat list snapshot.
    Loading,
    /// Snapshot applied and the push channel is open.
    Live,
    /// Snapshot applied but the push channel is not open: still connecting,
    /// reconnecting, or shut down.
    Degraded,
}

impl SessionState {
    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: SessionEvent) -> (Self, Vec<SessionAction>) {
        match (self, event) {
            (_, SessionEvent::LogoutRequested) => teardown(false),
            (_, SessionEvent::AuthRejected) => teardown(true),

            (Self::Unauthenticated, SessionEvent::TokenAvailable) => {
                (Self::Loading, vec![SessionAction::FetchSnapshot])
            }

            (Self::Loading, SessionEvent::RetryRequested) => {
                (Self::Loading, vec![SessionAction::FetchSnapshot])
            }
            (Self::Loading, SessionEvent::SnapshotLoaded) => {
                (Self::Degraded, vec![SessionAction::OpenChannel])
            }
            (Self::Loading, SessionEvent::SnapshotFailed { error }) => (
                Self::Loading,
                vec![SessionAction::Notify(SessionNotice::SnapshotFailed { error })],
            ),

            (Self::Live, SessionEvent::ChannelClosed { .. }) => (
                Self::Degraded,
                vec![SessionAction::Notify(SessionNotice::Connectivity {
                    online: false,
                })],
            ),
            (Self::Degraded, SessionEvent::ChannelOpened) => (
                Self::Live,
                vec![SessionAction::Notify(SessionNotice::Connectivity {
                    online: true,
                })],
            ),

            // Everything else leaves the state alone.
            (state, _) => (state, vec![]),
        }
    }

    /// Whether a session token is in use.
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Unauthenticated)
    }

    /// Whether the snapshot has been applied.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Live | Self::Degraded)
    }
}

fn teardown(forced: bool) -> (SessionState, Vec<SessionAction>) {
    (
        SessionState::Unauthenticated,
        vec![
            SessionAction::CloseChannel,
            SessionAction::ResetStore,
            SessionAction::ClearToken,
            SessionAction::Notify(SessionNotice::LoggedOut { forced }),
        ],
    )
}

/// Inputs to the session machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A token was supplied or restored.
    TokenAvailable,
    /// Caller asked to retry a failed snapshot.
    RetryRequested,
    /// Snapshot fetched and applied to the store.
    SnapshotLoaded,
    /// Snapshot fetch failed for a reason other than auth.
    SnapshotFailed {
        /// Error description.
        error: String,
    },
    /// Push channel opened (or reopened).
    ChannelOpened,
    /// Push channel closed abnormally.
    ChannelClosed {
        /// Reason for the closure.
        reason: String,
    },
    /// The server rejected the token.
    AuthRejected,
    /// Caller asked to log out.
    LogoutRequested,
}

/// Side effects requested by the session machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Fetch the chat list snapshot.
    FetchSnapshot,
    /// Open the push channel.
    OpenChannel,
    /// Close the push channel and cancel any reconnect.
    CloseChannel,
    /// Discard every conversation.
    ResetStore,
    /// Remove the persisted token.
    ClearToken,
    /// Report to the caller.
    Notify(SessionNotice),
}

/// Session changes reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// Snapshot fetch failed; call retry to try again.
    SnapshotFailed {
        /// Error description.
        error: String,
    },
    /// Connectivity changed.
    Connectivity {
        /// Whether the push channel is open.
        online: bool,
    },
    /// Session ended.
    LoggedOut {
        /// Whether the server forced it by rejecting the token.
        forced: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed() -> SessionEvent {
        SessionEvent::ChannelClosed {
            reason: "reset".into(),
        }
    }

    #[test]
    fn token_starts_snapshot() {
        let (state, actions) = SessionState::Unauthenticated.on_event(SessionEvent::TokenAvailable);
        assert_eq!(state, SessionState::Loading);
        assert_eq!(actions, vec![SessionAction::FetchSnapshot]);
    }

    #[test]
    fn snapshot_failure_waits_for_retry() {
        let (state, actions) = SessionState::Loading.on_event(SessionEvent::SnapshotFailed {
            error: "timeout".into(),
        });
        assert_eq!(state, SessionState::Loading);
        assert!(!actions.contains(&SessionAction::FetchSnapshot));

        let (state, actions) = state.on_event(SessionEvent::RetryRequested);
        assert_eq!(state, SessionState::Loading);
        assert_eq!(actions, vec![SessionAction::FetchSnapshot]);
    }

    #[test]
    fn snapshot_success_opens_channel() {
        let (state, actions) = SessionState::Loading.on_event(SessionEvent::SnapshotLoaded);
        assert_eq!(state, SessionState::Degraded);
        assert_eq!(actions, vec![SessionAction::OpenChannel]);
    }

    #[test]
    fn first_open_goes_live_and_reports_online() {
        let (state, _) = SessionState::Loading.on_event(SessionEvent::SnapshotLoaded);
        let (state, actions) = state.on_event(SessionEvent::ChannelOpened);
        assert_eq!(state, SessionState::Live);
        assert_eq!(
            actions,
            vec![SessionAction::Notify(SessionNotice::Connectivity { online: true })]
        );
    }

    #[test]
    fn failed_first_connect_stays_degraded_quietly() {
        let (state, _) = SessionState::Loading.on_event(SessionEvent::SnapshotLoaded);
        let (state, actions) = state.on_event(closed());
        assert_eq!(state, SessionState::Degraded);
        assert!(actions.is_empty());
    }

    #[test]
    fn channel_loss_degrades_and_recovers() {
        let (state, actions) = SessionState::Live.on_event(closed());
        assert_eq!(state, SessionState::Degraded);
        assert_eq!(
            actions,
            vec![SessionAction::Notify(SessionNotice::Connectivity { online: false })]
        );

        // Repeated closures while degraded are silent.
        let (state, actions) = state.on_event(closed());
        assert_eq!(state, SessionState::Degraded);
        assert!(actions.is_empty());

        let (state, actions) = state.on_event(SessionEvent::ChannelOpened);
        assert_eq!(state, SessionState::Live);
        assert_eq!(
            actions,
            vec![SessionAction::Notify(SessionNotice::Connectivity { online: true })]
        );
    }

    #[test]
    fn teardown_is_complete_from_every_state() {
        for state in [
            SessionState::Unauthenticated,
            SessionState::Loading,
            SessionState::Live,
            SessionState::Degraded,
        ] {
            for event in [SessionEvent::LogoutRequested, SessionEvent::AuthRejected] {
                let (next, actions) = state.on_event(event);
                assert_eq!(next, SessionState::Unauthenticated);
                assert!(actions.contains(&SessionAction::CloseChannel));
                assert!(actions.contains(&SessionAction::ResetStore));
                assert!(actions.contains(&SessionAction::ClearToken));
            }
        }
    }

    #[test]
    fn auth_rejection_is_reported_as_forced() {
        let (_, actions) = SessionState::Live.on_event(SessionEvent::AuthRejected);
        assert!(actions.contains(&SessionAction::Notify(SessionNotice::LoggedOut { forced: true })));
    }

    #[test]
    fn channel_events_before_snapshot_are_ignored() {
        let (state, actions) = SessionState::Loading.on_event(SessionEvent::ChannelOpened);
        assert_eq!(state, SessionState::Loading);
        assert!(actions.is_empty());
    }

    #[test]
    fn readiness_helpers() {
        assert!(!SessionState::Unauthenticated.is_authenticated());
        assert!(SessionState::Loading.is_authenticated());
        assert!(!SessionState::Loading.is_ready());
        assert!(SessionState::Live.is_ready());
        assert!(SessionState::Degraded.is_ready());
    }
}
