//! Offline demo backend for `--mock`.
//!
//! Serves a small fixed world from memory: three other users, two existing
//! conversations, and one live message that arrives as soon as the push
//! channel opens. Log in with [`DEMO_TOKEN`].

use chrono::{Duration, Utc};
use parley_chat_client::{MockApi, MockTransport};
use parley_chat_types::{ChatSummary, Envelope, MessageId, MessageRecord, Payload, UserId};

/// The only token the demo backend accepts.
pub const DEMO_TOKEN: &str = "demo-token";

/// Build the demo API and push transport.
pub fn backend() -> (MockApi, MockTransport) {
    let now = Utc::now();
    let api = MockApi::new();
    api.add_user("u1", "demo");
    api.add_user("u2", "bob");
    api.add_user("u3", "carol");
    api.add_user("u4", "dave");
    api.add_session(DEMO_TOKEN, "u1");

    api.set_chats(vec![
        ChatSummary {
            partner_id: UserId::from("u2"),
            display_name: "bob".into(),
            last_message_preview: "sure, 9am?".into(),
            last_message_at: now - Duration::minutes(50),
        },
        ChatSummary {
            partner_id: UserId::from("u3"),
            display_name: String::new(),
            last_message_preview: "thanks!".into(),
            last_message_at: now - Duration::days(2),
        },
    ]);
    api.set_history(
        "u2",
        vec![
            record("m2", "u1", "u2", "sure, 9am?", now - Duration::minutes(50)),
            record("m1", "u2", "u1", "coffee tomorrow?", now - Duration::hours(1)),
        ],
    );
    api.set_history(
        "u3",
        vec![record("m0", "u3", "u1", "thanks!", now - Duration::days(2))],
    );

    let transport = MockTransport::new();
    let live = Envelope {
        id: Some(MessageId::from("m3")),
        sender_id: Some(UserId::from("u3")),
        receiver_id: UserId::from("u1"),
        payload: Payload::from("are you around?"),
        created_at: Some(now),
    };
    if let Ok(frame) = live.to_json() {
        transport.push_frame(frame);
    }

    (api, transport)
}

fn record(
    id: &str,
    from: &str,
    to: &str,
    text: &str,
    at: chrono::DateTime<Utc>,
) -> MessageRecord {
    MessageRecord {
        id: MessageId::from(id),
        sender_id: UserId::from(from),
        receiver_id: UserId::from(to),
        payload: Payload::from(text),
        created_at: at,
    }
}
