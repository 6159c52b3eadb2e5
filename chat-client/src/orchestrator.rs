//! SyncOrchestrator - the main interface for Parley.
//!
//! The orchestrator owns the [`ConversationStore`] and is its only writer.
//! It runs the pure [`SessionState`] machine from chat-core and performs the
//! I/O its actions call for: snapshot and history fetches through a
//! [`ChatApi`], the live connection through a [`PushChannel`], and token
//! persistence through a [`TokenStore`].
//!
//! ```text
//! caller ──(&mut self calls)──▶ SyncOrchestrator ──▶ ChatApi ──▶ HTTP
//!    ▲                            │   │   ▲
//!    └──────(SyncUpdate)──────────┘   │   └──(ChannelUpdate, lookups)── background tasks
//!                                     ▼
//!                     chat-core (ConversationStore, Reconciler, SessionState)
//! ```
//!
//! Every method takes `&mut self`, so store mutations happen one event at a
//! time. Background tasks (the channel driver and display-name lookups)
//! never touch the store; they report over mpsc channels that
//! [`next_update`](SyncOrchestrator::next_update) drains in arrival order.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use parley_chat_core::{
    Conversation, ConversationStore, HistoryOutcome, Message, Reconciler, Reconciliation,
    ReconnectPolicy, SessionAction, SessionEvent, SessionNotice, SessionState,
};
use parley_chat_types::{Envelope, MessageId, UserId, UserRecord};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::ChatApi;
use crate::channel::{ChannelUpdate, PushChannel};
use crate::config::ClientConfig;
use crate::credentials::{SessionToken, StoredSession, TokenStore};
use crate::history::HistoryLoader;
use crate::transport::Transport;
use crate::ChatError;

/// Changes reported to the caller by [`SyncOrchestrator::next_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncUpdate {
    /// The session moved to a new state.
    Session(SessionState),
    /// The snapshot fetch failed; call
    /// [`retry_snapshot`](SyncOrchestrator::retry_snapshot) to try again.
    SnapshotFailed {
        /// Error description.
        error: String,
    },
    /// Push channel connectivity changed.
    Connectivity {
        /// Whether live messages are flowing.
        online: bool,
    },
    /// Conversations were added or their list order may have changed.
    ConversationsChanged,
    /// A live message was applied to the store.
    Message(Reconciliation),
    /// A conversation's history was loaded.
    HistoryLoaded(HistoryOutcome),
    /// A display-name lookup finished. `None` means the partner id stays as
    /// the label for good.
    NameResolved {
        /// Conversation partner.
        partner: UserId,
        /// Resolved name.
        name: Option<String>,
    },
    /// A send could not be handed to the push channel. The placeholder stays
    /// in the conversation; nothing is retried.
    SendFailed {
        /// Conversation partner.
        partner: UserId,
        /// Placeholder for the undelivered message.
        placeholder: MessageId,
        /// Error description.
        error: String,
    },
    /// An inbound frame was malformed or did not belong to this user.
    FrameDropped {
        /// Error description.
        error: String,
    },
    /// The session ended.
    LoggedOut {
        /// Whether the server forced it by rejecting the token.
        forced: bool,
    },
}

impl From<SessionNotice> for SyncUpdate {
    fn from(notice: SessionNotice) -> Self {
        match notice {
            SessionNotice::SnapshotFailed { error } => Self::SnapshotFailed { error },
            SessionNotice::Connectivity { online } => Self::Connectivity { online },
            SessionNotice::LoggedOut { forced } => Self::LoggedOut { forced },
        }
    }
}

/// Credentials and identity of the signed-in user.
#[derive(Debug)]
struct Identity {
    token: SessionToken,
    user_id: UserId,
    username: Option<String>,
    reconciler: Reconciler,
}

/// Result of a background display-name lookup.
#[derive(Debug)]
struct NameLookup {
    epoch: u64,
    partner: UserId,
    result: Result<UserRecord, ChatError>,
}

/// Client-side sync engine: session lifecycle, store ownership and I/O.
pub struct SyncOrchestrator<A: ChatApi, T: Transport, S: TokenStore> {
    config: ClientConfig,
    api: Arc<A>,
    history: HistoryLoader<A>,
    channel: PushChannel<T>,
    tokens: S,
    session: SessionState,
    store: ConversationStore,
    identity: Option<Identity>,
    active: Option<UserId>,
    updates: VecDeque<SyncUpdate>,
    channel_tx: mpsc::Sender<ChannelUpdate>,
    channel_rx: mpsc::Receiver<ChannelUpdate>,
    lookup_tx: mpsc::Sender<NameLookup>,
    lookup_rx: mpsc::Receiver<NameLookup>,
    /// Bumped on every store reset; lookups started before it are ignored.
    epoch: u64,
}

impl<A: ChatApi, T: Transport, S: TokenStore> SyncOrchestrator<A, T, S> {
    /// Create an unauthenticated orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if no push channel URL can be derived
    /// from the configuration.
    pub fn new(api: A, transport: T, tokens: S, config: ClientConfig) -> Result<Self, ChatError> {
        config.ws_endpoint()?;

        let (channel_tx, channel_rx) = mpsc::channel(config.event_buffer());
        let (lookup_tx, lookup_rx) = mpsc::channel(config.event_buffer());
        let api = Arc::new(api);
        let policy = ReconnectPolicy::fixed(config.reconnect_delay());

        Ok(Self {
            history: HistoryLoader::new(Arc::clone(&api)),
            api,
            channel: PushChannel::new(transport, policy),
            tokens,
            session: SessionState::default(),
            store: ConversationStore::new(),
            identity: None,
            active: None,
            updates: VecDeque::new(),
            channel_tx,
            channel_rx,
            lookup_tx,
            lookup_rx,
            epoch: 0,
            config,
        })
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Start a session from the persisted token, if there is one.
    ///
    /// Returns `Ok(false)` when nothing is persisted. A snapshot failure is
    /// returned as an error with the session left in
    /// [`SessionState::Loading`].
    pub async fn resume(&mut self) -> Result<bool, ChatError> {
        if self.session.is_authenticated() {
            return Ok(true);
        }
        let Some(stored) = self.tokens.load()? else {
            return Ok(false);
        };
        info!(user = %stored.user_id, "resuming stored session");
        self.begin_session(stored.token, stored.user_id, stored.username)
            .await?;
        Ok(true)
    }

    /// Start a session with a new token.
    ///
    /// Asks the server who the token belongs to, persists it, then loads the
    /// chat list and opens the push channel. An existing session is ended
    /// first. A snapshot failure is returned as an error with the session
    /// left in [`SessionState::Loading`]; call
    /// [`retry_snapshot`](Self::retry_snapshot).
    pub async fn authenticate(&mut self, token: SessionToken) -> Result<UserRecord, ChatError> {
        if self.session.is_authenticated() {
            self.logout().await?;
        }

        let user = self.api.current_user(&token).await?;
        info!(user = %user.id, username = %user.username, "token accepted");

        self.tokens.save(&StoredSession {
            token: token.clone(),
            user_id: user.id.clone(),
            username: Some(user.username.clone()),
        })?;
        self.begin_session(token, user.id.clone(), Some(user.username.clone()))
            .await?;
        Ok(user)
    }

    /// Retry a failed snapshot fetch.
    pub async fn retry_snapshot(&mut self) -> Result<(), ChatError> {
        match self.session {
            SessionState::Unauthenticated => Err(not_logged_in()),
            SessionState::Loading => self.dispatch(SessionEvent::RetryRequested).await,
            SessionState::Live | SessionState::Degraded => Ok(()),
        }
    }

    /// End the session: close the channel, discard every conversation and
    /// clear the persisted token.
    pub async fn logout(&mut self) -> Result<(), ChatError> {
        info!("logging out");
        self.dispatch(SessionEvent::LogoutRequested).await
    }

    /// Close the push channel but keep the session persisted.
    ///
    /// A ready session drops to [`SessionState::Degraded`] and nothing
    /// reconnects it.
    pub async fn shutdown(&mut self) {
        self.channel.close().await;
        self.drain_channel();
        let event = SessionEvent::ChannelClosed {
            reason: "shutdown".into(),
        };
        if let Err(e) = self.dispatch(event).await {
            warn!(error = %e, "session transition failed");
        }
    }

    async fn begin_session(
        &mut self,
        token: SessionToken,
        user_id: UserId,
        username: Option<String>,
    ) -> Result<(), ChatError> {
        let reconciler =
            Reconciler::new(user_id.clone()).with_tolerance(self.config.match_tolerance());
        self.identity = Some(Identity {
            token,
            user_id,
            username,
            reconciler,
        });
        self.dispatch(SessionEvent::TokenAvailable).await
    }

    // =========================================================================
    // User actions
    // =========================================================================

    /// Load the authoritative history for `partner` and make it the active
    /// conversation.
    ///
    /// Confirmed messages are replaced wholesale; pending sends the history
    /// does not contain are kept.
    pub async fn select_conversation(&mut self, partner: &UserId) -> Result<HistoryOutcome, ChatError> {
        let (token, reconciler) = {
            let identity = self.identity()?;
            (identity.token.clone(), identity.reconciler.clone())
        };
        self.active = Some(partner.clone());

        let history = match self.history.load(&token, partner).await {
            Ok(history) => history,
            Err(e) => return Err(self.fail(e).await),
        };

        let outcome = reconciler
            .apply_history(&mut self.store, partner, history)
            .map_err(|e| ChatError::Protocol(e.to_string()))?;
        info!(
            partner = %partner,
            loaded = outcome.loaded,
            retained = outcome.retained,
            skipped = outcome.skipped,
            "history loaded"
        );
        if outcome.skipped > 0 {
            warn!(partner = %partner, skipped = outcome.skipped, "history rows for other conversations ignored");
        }
        if outcome.new_conversation {
            self.spawn_lookup(partner.clone());
            self.updates.push_back(SyncUpdate::ConversationsChanged);
        }
        self.updates
            .push_back(SyncUpdate::HistoryLoaded(outcome.clone()));
        Ok(outcome)
    }

    /// Send `text` to `partner`.
    ///
    /// The text is trimmed. A placeholder is added to the conversation
    /// before anything goes over the wire and is returned. If the channel
    /// is not open the send is dropped: the call still succeeds, and a
    /// [`SyncUpdate::SendFailed`] is queued instead.
    pub async fn send_message(&mut self, partner: &UserId, text: &str) -> Result<Message, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::InvalidInput("message is empty".into()));
        }
        let reconciler = self.identity()?.reconciler.clone();

        let new_conversation = !self.store.contains(partner);
        let placeholder = reconciler
            .record_send(&mut self.store, partner, text, Utc::now())
            .map_err(|e| ChatError::Protocol(e.to_string()))?;
        if new_conversation {
            self.spawn_lookup(partner.clone());
            self.updates.push_back(SyncUpdate::ConversationsChanged);
        }

        let frame = Envelope::outbound(partner.clone(), text)
            .to_json()
            .map_err(|e| ChatError::Protocol(e.to_string()))?;
        match self.channel.send(&frame).await {
            Ok(()) => debug!(partner = %partner, placeholder = %placeholder.id, "message sent"),
            Err(e) => {
                warn!(
                    partner = %partner,
                    placeholder = %placeholder.id,
                    error = %e,
                    "push channel unavailable, message not sent"
                );
                self.updates.push_back(SyncUpdate::SendFailed {
                    partner: partner.clone(),
                    placeholder: placeholder.id.clone(),
                    error: e.to_string(),
                });
            }
        }
        Ok(placeholder)
    }

    /// Open a conversation with the user called `username`.
    ///
    /// Returns the partner id. An existing conversation is reused; a new one
    /// starts empty and sorts first.
    pub async fn start_chat(&mut self, username: &str) -> Result<UserId, ChatError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ChatError::InvalidInput("username is empty".into()));
        }
        let (token, local) = {
            let identity = self.identity()?;
            (identity.token.clone(), identity.user_id.clone())
        };

        let user = match self.api.user_by_name(&token, username).await {
            Ok(user) => user,
            Err(e) => return Err(self.fail(e).await),
        };
        if user.id == local {
            return Err(ChatError::InvalidInput("cannot start a chat with yourself".into()));
        }

        if self.store.open_conversation(&user.id, &user.username, Utc::now()) {
            info!(partner = %user.id, "new conversation");
            self.updates.push_back(SyncUpdate::ConversationsChanged);
        }
        self.active = Some(user.id.clone());
        Ok(user.id)
    }

    // =========================================================================
    // Background events
    // =========================================================================

    /// Wait for the next change.
    ///
    /// Processes channel events and lookup results one at a time, in arrival
    /// order. Waits indefinitely while nothing happens, so wrap the call in a
    /// timeout to poll. The orchestrator keeps both queue senders, so in
    /// practice this never returns `None`.
    pub async fn next_update(&mut self) -> Option<SyncUpdate> {
        loop {
            if let Some(update) = self.updates.pop_front() {
                return Some(update);
            }

            tokio::select! {
                Some(update) = self.channel_rx.recv() => self.on_channel(update).await,
                Some(lookup) = self.lookup_rx.recv() => self.on_lookup(lookup).await,
                else => return None,
            }
        }
    }

    /// Pop an already-queued update without waiting.
    pub fn poll_update(&mut self) -> Option<SyncUpdate> {
        self.updates.pop_front()
    }

    async fn on_channel(&mut self, update: ChannelUpdate) {
        let event = match update {
            ChannelUpdate::Frame(frame) => {
                self.on_frame(&frame);
                return;
            }
            ChannelUpdate::Opened { reconnect } => {
                if reconnect {
                    info!("push channel restored");
                }
                SessionEvent::ChannelOpened
            }
            ChannelUpdate::Closed { reason, .. } => SessionEvent::ChannelClosed { reason },
        };
        if let Err(e) = self.dispatch(event).await {
            warn!(error = %e, "session transition failed");
        }
    }

    fn on_frame(&mut self, frame: &str) {
        let result = {
            let Some(identity) = &self.identity else {
                debug!("frame outside a session ignored");
                return;
            };
            let message = match Envelope::from_json(frame).and_then(Envelope::into_record) {
                Ok(record) => Message::from(record),
                Err(e) => {
                    warn!(error = %e, "dropping malformed frame");
                    self.updates.push_back(SyncUpdate::FrameDropped {
                        error: e.to_string(),
                    });
                    return;
                }
            };
            identity.reconciler.apply(&mut self.store, message)
        };

        match result {
            Ok(reconciliation) => {
                debug!(
                    partner = %reconciliation.partner(),
                    outcome = ?reconciliation,
                    "message reconciled"
                );
                if let Reconciliation::Appended {
                    partner,
                    new_conversation: true,
                    ..
                } = &reconciliation
                {
                    self.spawn_lookup(partner.clone());
                    self.updates.push_back(SyncUpdate::ConversationsChanged);
                }
                if reconciliation.changed() {
                    self.updates.push_back(SyncUpdate::Message(reconciliation));
                }
            }
            Err(e) => {
                warn!(error = %e, "dropping frame");
                self.updates.push_back(SyncUpdate::FrameDropped {
                    error: e.to_string(),
                });
            }
        }
    }

    async fn on_lookup(&mut self, lookup: NameLookup) {
        if lookup.epoch != self.epoch {
            debug!(partner = %lookup.partner, "stale name lookup ignored");
            return;
        }
        let partner = lookup.partner;
        match lookup.result {
            Ok(user) => {
                if let Err(e) = self.store.set_display_name(&partner, &user.username) {
                    debug!(partner = %partner, error = %e, "name for unknown conversation");
                    return;
                }
                self.updates.push_back(SyncUpdate::NameResolved {
                    partner,
                    name: Some(user.username),
                });
            }
            Err(e) if e.is_auth() => {
                self.fail(e).await;
            }
            Err(e) => {
                warn!(partner = %partner, error = %e, "display name lookup failed, keeping partner id");
                if self.store.mark_name_unresolved(&partner).is_ok() {
                    self.updates.push_back(SyncUpdate::NameResolved {
                        partner,
                        name: None,
                    });
                }
            }
        }
    }

    fn spawn_lookup(&self, partner: UserId) {
        let Some(identity) = &self.identity else {
            return;
        };
        let api = Arc::clone(&self.api);
        let token = identity.token.clone();
        let tx = self.lookup_tx.clone();
        let epoch = self.epoch;

        debug!(partner = %partner, "resolving display name");
        tokio::spawn(async move {
            let result = api.user(&token, &partner).await;
            let _ = tx
                .send(NameLookup {
                    epoch,
                    partner,
                    result,
                })
                .await;
        });
    }

    // =========================================================================
    // Session machine
    // =========================================================================

    /// Feed `event` to the session machine and execute the resulting actions,
    /// including any follow-up events they produce. Returns the first error.
    async fn dispatch(&mut self, event: SessionEvent) -> Result<(), ChatError> {
        let mut events = VecDeque::from([event]);
        let mut result = Ok(());

        while let Some(event) = events.pop_front() {
            let previous = self.session;
            let (next, actions) = previous.on_event(event);
            self.session = next;
            if next != previous {
                info!(from = ?previous, to = ?next, "session state changed");
                self.updates.push_back(SyncUpdate::Session(next));
            }

            for action in actions {
                if let Err(e) = self.execute(action, &mut events).await {
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }
        result
    }

    async fn execute(
        &mut self,
        action: SessionAction,
        events: &mut VecDeque<SessionEvent>,
    ) -> Result<(), ChatError> {
        match action {
            SessionAction::FetchSnapshot => match self.fetch_snapshot().await {
                Ok(()) => {
                    events.push_back(SessionEvent::SnapshotLoaded);
                    Ok(())
                }
                Err(e) if e.is_auth() => {
                    warn!(error = %e, "token rejected, ending session");
                    events.push_back(SessionEvent::AuthRejected);
                    Err(e)
                }
                Err(e) => {
                    warn!(error = %e, "chat list fetch failed");
                    events.push_back(SessionEvent::SnapshotFailed {
                        error: e.to_string(),
                    });
                    Err(e)
                }
            },
            SessionAction::OpenChannel => self.open_channel().await,
            SessionAction::CloseChannel => {
                self.channel.close().await;
                self.drain_channel();
                Ok(())
            }
            SessionAction::ResetStore => {
                self.store.reset();
                self.active = None;
                self.epoch += 1;
                Ok(())
            }
            SessionAction::ClearToken => {
                self.identity = None;
                self.tokens.clear()
            }
            SessionAction::Notify(notice) => {
                self.updates.push_back(notice.into());
                Ok(())
            }
        }
    }

    async fn fetch_snapshot(&mut self) -> Result<(), ChatError> {
        let token = self.identity()?.token.clone();
        let chats = self.history.snapshot(&token).await?;
        info!(count = chats.len(), "chat list loaded");

        self.store.apply_snapshot(&chats);
        for chat in chats.iter().filter(|c| c.display_name.is_empty()) {
            self.spawn_lookup(chat.partner_id.clone());
        }
        self.updates.push_back(SyncUpdate::ConversationsChanged);
        Ok(())
    }

    async fn open_channel(&mut self) -> Result<(), ChatError> {
        let token = self.identity()?.token.clone();
        let mut url = self.config.ws_endpoint()?;
        url.query_pairs_mut().append_pair("token", token.expose());
        self.channel.open(url, self.channel_tx.clone()).await;
        Ok(())
    }

    /// Discard updates from a channel driver that has already stopped.
    fn drain_channel(&mut self) {
        while self.channel_rx.try_recv().is_ok() {}
    }

    /// End the session if `error` is an auth failure, then hand it back.
    async fn fail(&mut self, error: ChatError) -> ChatError {
        if error.is_auth() {
            warn!(error = %error, "token rejected, ending session");
            if let Err(e) = self.dispatch(SessionEvent::AuthRejected).await {
                warn!(error = %e, "session teardown incomplete");
            }
        }
        error
    }

    fn identity(&self) -> Result<&Identity, ChatError> {
        self.identity.as_ref().ok_or_else(not_logged_in)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current session state.
    pub fn session_state(&self) -> SessionState {
        self.session
    }

    /// The signed-in user's id.
    pub fn local_user(&self) -> Option<&UserId> {
        self.identity.as_ref().map(|i| &i.user_id)
    }

    /// The signed-in user's name, if known.
    pub fn local_username(&self) -> Option<&str> {
        self.identity.as_ref().and_then(|i| i.username.as_deref())
    }

    /// The conversation store (read-only).
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Conversations, most recent first.
    pub fn conversations(&self) -> Vec<&Conversation> {
        self.store.list()
    }

    /// One conversation.
    pub fn conversation(&self, partner: &UserId) -> Option<&Conversation> {
        self.store.get(partner)
    }

    /// The most recently selected or started conversation.
    pub fn active_conversation(&self) -> Option<&UserId> {
        self.active.as_ref()
    }

    /// Whether the push channel is open.
    pub fn is_online(&self) -> bool {
        self.channel.is_open()
    }

    /// The push channel's transport.
    pub fn transport(&self) -> &T {
        self.channel.transport()
    }
}

fn not_logged_in() -> ChatError {
    ChatError::Auth("not logged in".into())
}
