//! End-to-end orchestrator tests over MockApi + MockTransport.
//!
//! Time is paused: idle waits auto-advance the clock, so reconnect delays
//! cost nothing and `drain` returns as soon as the orchestrator goes quiet.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parley_chat_client::core::{DisplayName, Reconciliation, SessionState};
use parley_chat_client::types::{
    ChatSummary, Envelope, MessageId, MessageRecord, Payload, UserId,
};
use parley_chat_client::{
    ChatError, ClientConfig, Endpoint, MemoryTokenStore, MockApi, MockTransport, SessionToken,
    StoredSession, SyncOrchestrator, SyncUpdate, TokenStore, Transport,
};
use url::Url;

type Chat = SyncOrchestrator<MockApi, MockTransport, MemoryTokenStore>;

// =============================================================================
// Helpers
// =============================================================================

fn server() -> MockApi {
    let api = MockApi::new();
    api.add_user("u1", "alice");
    api.add_user("u2", "Bob");
    api.add_user("u3", "carol");
    api.add_session("tok", "u1");
    api
}

fn config() -> ClientConfig {
    ClientConfig::new(Url::parse("http://chat.test").unwrap())
}

fn client(api: &MockApi, transport: &MockTransport, tokens: &MemoryTokenStore) -> Chat {
    SyncOrchestrator::new(api.clone(), transport.clone(), tokens.clone(), config()).unwrap()
}

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn record(id: &str, from: &str, to: &str, text: &str, at: DateTime<Utc>) -> MessageRecord {
    MessageRecord {
        id: MessageId::from(id),
        sender_id: UserId::from(from),
        receiver_id: UserId::from(to),
        payload: Payload::from(text),
        created_at: at,
    }
}

fn frame(id: &str, from: &str, to: &str, text: &str, at: DateTime<Utc>) -> String {
    Envelope {
        id: Some(MessageId::from(id)),
        sender_id: Some(UserId::from(from)),
        receiver_id: UserId::from(to),
        payload: Payload::from(text),
        created_at: Some(at),
    }
    .to_json()
    .unwrap()
}

fn summary(partner: &str, name: &str, preview: &str, at: DateTime<Utc>) -> ChatSummary {
    ChatSummary {
        partner_id: UserId::from(partner),
        display_name: name.into(),
        last_message_preview: preview.into(),
        last_message_at: at,
    }
}

/// Collect updates until nothing arrives for a while.
async fn drain(chat: &mut Chat) -> Vec<SyncUpdate> {
    let mut updates = Vec::new();
    while let Ok(Some(update)) =
        tokio::time::timeout(Duration::from_millis(100), chat.next_update()).await
    {
        updates.push(update);
    }
    updates
}

async fn live(api: &MockApi, transport: &MockTransport) -> Chat {
    let mut chat = client(api, transport, &MemoryTokenStore::new());
    chat.authenticate(SessionToken::new("tok")).await.unwrap();
    drain(&mut chat).await;
    assert_eq!(chat.session_state(), SessionState::Live);
    assert!(chat.is_online());
    chat
}

fn ids(chat: &Chat, partner: &str) -> Vec<String> {
    chat.conversation(&UserId::from(partner))
        .map(|c| c.messages().iter().map(|m| m.id.to_string()).collect())
        .unwrap_or_default()
}

// =============================================================================
// Startup
// =============================================================================

#[tokio::test(start_paused = true)]
async fn snapshot_then_history_yields_exactly_the_server_message() {
    let api = server();
    api.set_chats(vec![summary("u2", "Bob", "hey", t(0))]);
    api.set_history("u2", vec![record("m1", "u2", "u1", "hey", t(0))]);
    let transport = MockTransport::new();

    let mut chat = live(&api, &transport).await;
    let bob = UserId::from("u2");
    assert_eq!(chat.conversation(&bob).unwrap().last_message_preview(), Some("hey"));
    assert!(chat.conversation(&bob).unwrap().messages().is_empty());

    let outcome = chat.select_conversation(&bob).await.unwrap();
    assert_eq!(outcome.loaded, 1);
    assert_eq!(ids(&chat, "u2"), ["m1"]);
    assert_eq!(chat.conversation(&bob).unwrap().label(), "Bob");
    assert_eq!(chat.active_conversation(), Some(&bob));
}

#[tokio::test(start_paused = true)]
async fn authenticate_persists_token_and_opens_channel_with_it() {
    let api = server();
    let transport = MockTransport::new();
    let tokens = MemoryTokenStore::new();

    let mut chat = client(&api, &transport, &tokens);
    let me = chat.authenticate(SessionToken::new("tok")).await.unwrap();
    assert_eq!(me.id, UserId::from("u1"));

    let updates = drain(&mut chat).await;
    assert!(updates.contains(&SyncUpdate::Session(SessionState::Loading)));
    assert!(updates.contains(&SyncUpdate::Session(SessionState::Live)));

    let stored = tokens.load().unwrap().unwrap();
    assert_eq!(stored.user_id, UserId::from("u1"));
    assert_eq!(stored.username.as_deref(), Some("alice"));

    let urls = transport.connected_urls();
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].path(), "/ws");
    assert_eq!(urls[0].query(), Some("token=tok"));
}

#[tokio::test(start_paused = true)]
async fn session_goes_live_only_once_the_channel_opens() {
    let api = server();
    api.set_chats(vec![summary("u2", "Bob", "hey", t(0))]);
    let transport = MockTransport::new();
    let mut chat = client(&api, &transport, &MemoryTokenStore::new());
    let bob = UserId::from("u2");

    chat.authenticate(SessionToken::new("tok")).await.unwrap();
    assert_eq!(chat.session_state(), SessionState::Degraded);
    assert!(chat.session_state().is_ready());

    let updates = drain(&mut chat).await;
    let degraded = updates
        .iter()
        .position(|u| *u == SyncUpdate::Session(SessionState::Degraded))
        .unwrap();
    let live = updates
        .iter()
        .position(|u| *u == SyncUpdate::Session(SessionState::Live))
        .unwrap();
    assert!(degraded < live);
    assert!(updates.contains(&SyncUpdate::Connectivity { online: true }));
    assert!(chat.is_online());

    chat.send_message(&bob, "hi").await.unwrap();
    let updates = drain(&mut chat).await;
    assert!(!updates
        .iter()
        .any(|u| matches!(u, SyncUpdate::SendFailed { .. })));
    assert_eq!(transport.sent_frames().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unreachable_server_leaves_session_degraded() {
    let api = server();
    let transport = MockTransport::new();
    transport.fail_connects(usize::MAX);
    let mut chat = client(&api, &transport, &MemoryTokenStore::new());

    chat.authenticate(SessionToken::new("tok")).await.unwrap();
    let updates = drain(&mut chat).await;

    assert_eq!(chat.session_state(), SessionState::Degraded);
    assert!(!chat.is_online());
    assert!(!updates.contains(&SyncUpdate::Session(SessionState::Live)));
}

#[tokio::test(start_paused = true)]
async fn resume_uses_persisted_session_without_asking_who_we_are() {
    let api = server();
    let transport = MockTransport::new();
    let tokens = MemoryTokenStore::with_session(StoredSession {
        token: SessionToken::new("tok"),
        user_id: UserId::from("u1"),
        username: None,
    });

    let mut chat = client(&api, &transport, &tokens);
    assert!(chat.resume().await.unwrap());
    drain(&mut chat).await;

    assert_eq!(chat.session_state(), SessionState::Live);
    assert_eq!(chat.local_user(), Some(&UserId::from("u1")));
    assert_eq!(api.calls(Endpoint::CurrentUser), 0);
}

#[tokio::test(start_paused = true)]
async fn resume_without_persisted_session_does_nothing() {
    let api = server();
    let transport = MockTransport::new();
    let mut chat = client(&api, &transport, &MemoryTokenStore::new());

    assert!(!chat.resume().await.unwrap());
    assert_eq!(chat.session_state(), SessionState::Unauthenticated);
    assert_eq!(transport.connect_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn snapshot_failure_stays_loading_until_retry() {
    let api = server();
    api.set_chats(vec![summary("u2", "Bob", "hey", t(0))]);
    api.fail_next(Endpoint::Chats, ChatError::TransientNetwork("503".into()));
    let transport = MockTransport::new();
    let tokens = MemoryTokenStore::new();

    let mut chat = client(&api, &transport, &tokens);
    let err = chat.authenticate(SessionToken::new("tok")).await.unwrap_err();
    assert!(matches!(err, ChatError::TransientNetwork(_)));

    let updates = drain(&mut chat).await;
    assert!(updates
        .iter()
        .any(|u| matches!(u, SyncUpdate::SnapshotFailed { .. })));
    assert_eq!(chat.session_state(), SessionState::Loading);
    assert_eq!(transport.connect_attempts(), 0);
    // The token is kept: only auth failures end the session.
    assert!(tokens.load().unwrap().is_some());

    chat.retry_snapshot().await.unwrap();
    drain(&mut chat).await;
    assert_eq!(chat.session_state(), SessionState::Live);
    assert_eq!(chat.conversations().len(), 1);
    assert_eq!(api.calls(Endpoint::Chats), 2);
}

#[tokio::test(start_paused = true)]
async fn unnamed_snapshot_rows_get_their_names_resolved() {
    let api = server();
    api.set_chats(vec![summary("u3", "", "yo", t(0))]);
    let transport = MockTransport::new();

    let mut chat = client(&api, &transport, &MemoryTokenStore::new());
    chat.authenticate(SessionToken::new("tok")).await.unwrap();
    let updates = drain(&mut chat).await;

    assert!(updates.contains(&SyncUpdate::NameResolved {
        partner: UserId::from("u3"),
        name: Some("carol".into()),
    }));
    assert_eq!(chat.conversation(&UserId::from("u3")).unwrap().label(), "carol");
}

// =============================================================================
// Optimistic sends
// =============================================================================

#[tokio::test(start_paused = true)]
async fn optimistic_send_is_replaced_by_its_echo() {
    let api = server();
    api.set_chats(vec![summary("u2", "Bob", "hey", t(0))]);
    let transport = MockTransport::new();
    let mut chat = live(&api, &transport).await;
    let bob = UserId::from("u2");

    let placeholder = chat.send_message(&bob, "  hi  ").await.unwrap();
    assert!(placeholder.id.is_placeholder());
    assert_eq!(placeholder.payload, "hi");
    assert_eq!(chat.conversation(&bob).unwrap().pending().count(), 1);
    assert_eq!(
        transport.last_sent().unwrap(),
        Envelope::outbound(bob.clone(), "hi").to_json().unwrap()
    );

    transport.push_frame(frame("m9", "u1", "u2", "hi", Utc::now()));
    let updates = drain(&mut chat).await;

    assert!(updates.contains(&SyncUpdate::Message(Reconciliation::Confirmed {
        partner: bob.clone(),
        placeholder: placeholder.id.clone(),
        message_id: MessageId::from("m9"),
    })));
    let conversation = chat.conversation(&bob).unwrap();
    assert_eq!(ids(&chat, "u2"), ["m9"]);
    assert_eq!(conversation.pending().count(), 0);
    assert_eq!(conversation.last_message_preview(), Some("hi"));
}

#[tokio::test(start_paused = true)]
async fn empty_send_is_rejected_and_nothing_is_stored() {
    let api = server();
    let transport = MockTransport::new();
    let mut chat = live(&api, &transport).await;

    let err = chat.send_message(&UserId::from("u2"), "   ").await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidInput(_)));
    assert!(chat.conversations().is_empty());
    assert!(transport.sent_frames().is_empty());
}

#[tokio::test(start_paused = true)]
async fn send_while_disconnected_keeps_placeholder_and_reports_failure() {
    let api = server();
    api.set_chats(vec![summary("u2", "Bob", "hey", t(0))]);
    let transport = MockTransport::new();
    let mut chat = live(&api, &transport).await;
    let bob = UserId::from("u2");

    transport.fail_connects(usize::MAX);
    transport.drop_connection();
    let updates = drain(&mut chat).await;
    assert!(updates.contains(&SyncUpdate::Connectivity { online: false }));
    assert_eq!(chat.session_state(), SessionState::Degraded);

    let placeholder = chat.send_message(&bob, "anyone?").await.unwrap();
    let updates = drain(&mut chat).await;
    assert!(updates.iter().any(|u| matches!(
        u,
        SyncUpdate::SendFailed { placeholder: p, .. } if *p == placeholder.id
    )));
    assert_eq!(chat.conversation(&bob).unwrap().pending().count(), 1);
    assert!(transport.sent_frames().is_empty());
}

// =============================================================================
// Live stream
// =============================================================================

#[tokio::test(start_paused = true)]
async fn unknown_partner_inbound_creates_one_conversation_and_resolves_name() {
    let api = server();
    let transport = MockTransport::new();
    let mut chat = live(&api, &transport).await;

    transport.push_frame(frame("m1", "u3", "u1", "hello", t(5)));
    let updates = drain(&mut chat).await;

    let carol = UserId::from("u3");
    assert!(updates.contains(&SyncUpdate::ConversationsChanged));
    assert!(updates.contains(&SyncUpdate::NameResolved {
        partner: carol.clone(),
        name: Some("carol".into()),
    }));

    let list = chat.conversations();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].partner_id(), &carol);
    assert_eq!(list[0].label(), "carol");
    assert_eq!(ids(&chat, "u3"), ["m1"]);
}

#[tokio::test(start_paused = true)]
async fn failed_name_lookup_keeps_partner_id_for_good() {
    let api = server();
    let transport = MockTransport::new();
    let mut chat = live(&api, &transport).await;

    // u7 is not a known user: the lookup returns NotFound.
    transport.push_frame(frame("m1", "u7", "u1", "who dis", t(5)));
    let updates = drain(&mut chat).await;

    let stranger = UserId::from("u7");
    assert!(updates.contains(&SyncUpdate::NameResolved {
        partner: stranger.clone(),
        name: None,
    }));
    let conversation = chat.conversation(&stranger).unwrap();
    assert_eq!(conversation.display_name(), &DisplayName::Unresolved);
    assert_eq!(conversation.label(), "u7");

    // A later message does not retry the lookup.
    transport.push_frame(frame("m2", "u7", "u1", "hello?", t(6)));
    drain(&mut chat).await;
    assert_eq!(api.calls(Endpoint::User), 1);
}

#[tokio::test(start_paused = true)]
async fn redelivered_frames_are_stored_once() {
    let api = server();
    let transport = MockTransport::new();
    let mut chat = live(&api, &transport).await;

    transport.push_frame(frame("m1", "u2", "u1", "one", t(1)));
    transport.push_frame(frame("m1", "u2", "u1", "one", t(1)));
    transport.push_frame(frame("m2", "u2", "u1", "two", t(2)));
    transport.push_frame(frame("m1", "u2", "u1", "one", t(1)));
    drain(&mut chat).await;

    assert_eq!(ids(&chat, "u2"), ["m1", "m2"]);
}

#[tokio::test(start_paused = true)]
async fn malformed_and_foreign_frames_are_dropped() {
    let api = server();
    let transport = MockTransport::new();
    let mut chat = live(&api, &transport).await;

    transport.push_frame("{not json");
    transport.push_frame(r#"{"receiver_id":"u1","payload":[104,105]}"#);
    transport.push_frame(frame("m1", "u2", "u3", "not for us", t(1)));
    transport.push_frame(frame("m2", "u2", "u1", "for us", t(2)));
    let updates = drain(&mut chat).await;

    let dropped = updates
        .iter()
        .filter(|u| matches!(u, SyncUpdate::FrameDropped { .. }))
        .count();
    assert_eq!(dropped, 3);
    assert_eq!(chat.session_state(), SessionState::Live);
    assert_eq!(ids(&chat, "u2"), ["m2"]);
}

// =============================================================================
// Reconnect
// =============================================================================

#[tokio::test(start_paused = true)]
async fn reconnect_recovers_without_duplicating_or_dropping() {
    let api = server();
    let transport = MockTransport::new();
    let mut chat = live(&api, &transport).await;

    transport.push_frame(frame("m1", "u2", "u1", "before", t(1)));
    drain(&mut chat).await;

    transport.drop_connection();
    let updates = drain(&mut chat).await;
    assert!(updates.contains(&SyncUpdate::Connectivity { online: false }));
    assert_eq!(chat.session_state(), SessionState::Degraded);
    assert_eq!(transport.connect_attempts(), 1);

    tokio::time::sleep(Duration::from_secs(3)).await;
    let updates = drain(&mut chat).await;
    assert!(updates.contains(&SyncUpdate::Connectivity { online: true }));
    assert_eq!(chat.session_state(), SessionState::Live);
    assert_eq!(transport.connect_attempts(), 2);

    // Replay of an old message plus a new one after the reconnect.
    transport.push_frame(frame("m1", "u2", "u1", "before", t(1)));
    transport.push_frame(frame("m2", "u2", "u1", "after", t(9)));
    drain(&mut chat).await;
    assert_eq!(ids(&chat, "u2"), ["m1", "m2"]);
}

#[tokio::test(start_paused = true)]
async fn selecting_a_stranger_with_no_history_creates_nothing() {
    let api = server();
    let transport = MockTransport::new();
    let mut chat = live(&api, &transport).await;
    let stranger = UserId::from("u9");

    let outcome = chat.select_conversation(&stranger).await.unwrap();
    let updates = drain(&mut chat).await;

    assert_eq!(outcome.loaded, 0);
    assert!(!outcome.new_conversation);
    assert!(chat.conversation(&stranger).is_none());
    assert!(chat.conversations().is_empty());
    assert!(!updates.contains(&SyncUpdate::ConversationsChanged));
    assert_eq!(api.calls(Endpoint::User), 0);
}

#[tokio::test(start_paused = true)]
async fn history_fills_the_gap_and_keeps_unmatched_placeholders() {
    let api = server();
    let transport = MockTransport::new();
    let mut chat = live(&api, &transport).await;
    let bob = UserId::from("u2");

    transport.fail_connects(usize::MAX);
    transport.drop_connection();
    drain(&mut chat).await;

    let lost = chat.send_message(&bob, "lost").await.unwrap();
    let now = Utc::now();
    api.set_history(
        "u2",
        vec![
            record("m3", "u2", "u1", "missed while offline", now),
            record("m2", "u2", "u1", "earlier", now - chrono::Duration::seconds(30)),
        ],
    );

    let outcome = chat.select_conversation(&bob).await.unwrap();
    assert_eq!(outcome.loaded, 2);
    assert_eq!(outcome.retained, 1);

    let conversation = chat.conversation(&bob).unwrap();
    let stored: Vec<_> = conversation.messages().iter().map(|m| m.id.clone()).collect();
    assert_eq!(stored.len(), 3);
    assert!(stored.contains(&lost.id));
    assert_eq!(conversation.pending().count(), 1);
}

// =============================================================================
// New chats
// =============================================================================

#[tokio::test(start_paused = true)]
async fn start_chat_creates_an_empty_conversation_first_in_list() {
    let api = server();
    api.set_chats(vec![summary("u2", "Bob", "hey", t(0))]);
    let transport = MockTransport::new();
    let mut chat = live(&api, &transport).await;

    let carol = chat.start_chat("carol").await.unwrap();
    assert_eq!(carol, UserId::from("u3"));
    assert_eq!(chat.active_conversation(), Some(&carol));

    let list = chat.conversations();
    assert_eq!(list[0].partner_id(), &carol);
    assert_eq!(list[0].label(), "carol");
    assert!(list[0].messages().is_empty());

    // Starting it again reuses the conversation.
    chat.start_chat("carol").await.unwrap();
    assert_eq!(chat.conversations().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn start_chat_reports_unknown_user() {
    let api = server();
    let transport = MockTransport::new();
    let mut chat = live(&api, &transport).await;

    let err = chat.start_chat("nobody").await.unwrap_err();
    assert!(matches!(err, ChatError::NotFound(_)));
    assert!(chat.conversations().is_empty());
    assert_eq!(chat.session_state(), SessionState::Live);

    let err = chat.start_chat("alice").await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidInput(_)));
}

// =============================================================================
// Session end
// =============================================================================

#[tokio::test(start_paused = true)]
async fn logout_closes_channel_clears_store_and_token() {
    let api = server();
    api.set_chats(vec![summary("u2", "Bob", "hey", t(0))]);
    let transport = MockTransport::new();
    let tokens = MemoryTokenStore::new();

    let mut chat = client(&api, &transport, &tokens);
    chat.authenticate(SessionToken::new("tok")).await.unwrap();
    drain(&mut chat).await;
    assert_eq!(chat.conversations().len(), 1);

    chat.logout().await.unwrap();
    let updates = drain(&mut chat).await;

    assert!(updates.contains(&SyncUpdate::LoggedOut { forced: false }));
    assert_eq!(chat.session_state(), SessionState::Unauthenticated);
    assert!(chat.conversations().is_empty());
    assert!(tokens.load().unwrap().is_none());
    assert!(!chat.is_online());
    assert!(!transport.is_connected());
    assert_eq!(chat.local_user(), None);

    // No reconnect leaks after logout.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.connect_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_channel_and_keeps_session() {
    let api = server();
    let transport = MockTransport::new();
    let tokens = MemoryTokenStore::new();

    let mut chat = client(&api, &transport, &tokens);
    chat.authenticate(SessionToken::new("tok")).await.unwrap();
    drain(&mut chat).await;
    assert_eq!(chat.session_state(), SessionState::Live);

    chat.shutdown().await;
    let updates = drain(&mut chat).await;

    assert!(updates.contains(&SyncUpdate::Connectivity { online: false }));
    assert_eq!(chat.session_state(), SessionState::Degraded);
    assert!(!chat.is_online());
    assert!(tokens.load().unwrap().is_some());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.connect_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_token_forces_logout() {
    let api = server();
    let transport = MockTransport::new();
    let tokens = MemoryTokenStore::new();

    let mut chat = client(&api, &transport, &tokens);
    chat.authenticate(SessionToken::new("tok")).await.unwrap();
    drain(&mut chat).await;

    api.revoke_sessions();
    let err = chat.select_conversation(&UserId::from("u2")).await.unwrap_err();
    assert!(err.is_auth());

    let updates = drain(&mut chat).await;
    assert!(updates.contains(&SyncUpdate::LoggedOut { forced: true }));
    assert_eq!(chat.session_state(), SessionState::Unauthenticated);
    assert!(tokens.load().unwrap().is_none());
    assert!(chat.conversations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_token_is_rejected_before_anything_persists() {
    let api = server();
    let transport = MockTransport::new();
    let tokens = MemoryTokenStore::new();

    let mut chat = client(&api, &transport, &tokens);
    let err = chat.authenticate(SessionToken::new("bogus")).await.unwrap_err();

    assert!(err.is_auth());
    assert!(tokens.load().unwrap().is_none());
    assert_eq!(chat.session_state(), SessionState::Unauthenticated);
    assert_eq!(transport.connect_attempts(), 0);
}
