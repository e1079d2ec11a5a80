//! Test fixtures for end-to-end flows
//!
//! Provides TestEnvironment that wires the real dispatch front, state machine
//! and approval coordinator to a temporary SQLite file and a recording
//! transport.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use roadpass::approval::ApprovalCoordinator;
use roadpass::conversation::{CallbackAction, ConversationState, Event, SessionStore, StateMachine};
use roadpass::core::payment_settings::PaymentDestination;
use roadpass::core::{Authz, PaymentSettings};
use roadpass::storage::{create_pool, get_connection, users, DbConnection, DbPool};
use roadpass::telegram::dispatch::callback_payload;
use roadpass::telegram::{Dispatch, Inbound, Incoming, MessageRef, Payload};

use super::recorder::{RecordingTransport, Sent};

pub const SUPER: i64 = 1001;
pub const ADMIN: i64 = 1002;
pub const USER: i64 = 2001;

/// Complete test environment
///
/// # Example
/// ```ignore
/// let env = TestEnvironment::new();
/// env.send(USER, Event::Start).await;
/// let calls = env.transport.drain();
/// ```
pub struct TestEnvironment {
    _dir: tempfile::TempDir,
    pub db_pool: Arc<DbPool>,
    pub transport: Arc<RecordingTransport>,
    pub sessions: Arc<SessionStore>,
    pub dispatch: Dispatch,
    callbacks: AtomicUsize,
}

impl TestEnvironment {
    /// Fresh database with one configured super-admin and no other users.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roadpass.sqlite");
        let db_pool = Arc::new(create_pool(path.to_str().unwrap()).unwrap());

        let authz = Authz::new([SUPER]);
        authz.bootstrap(&get_connection(&db_pool).unwrap()).unwrap();

        let transport = Arc::new(RecordingTransport::default());
        let sessions = Arc::new(SessionStore::new(None));
        let payment_settings = Arc::new(PaymentSettings::new(
            14.09,
            PaymentDestination {
                cards: "8600 0000 0000 0000".into(),
                owner: "Test Owner".into(),
            },
        ));
        let machine = StateMachine::new(db_pool.clone(), authz.clone(), payment_settings);
        let coordinator = ApprovalCoordinator::new(db_pool.clone(), authz, transport.clone());
        let dispatch = Dispatch::new(db_pool.clone(), machine, sessions.clone(), coordinator, transport.clone());

        Self {
            _dir: dir,
            db_pool,
            transport,
            sessions,
            dispatch,
            callbacks: AtomicUsize::new(0),
        }
    }

    pub fn conn(&self) -> DbConnection {
        get_connection(&self.db_pool).unwrap()
    }

    /// Registers `user_id` as a promoted admin.
    pub fn promote(&self, user_id: i64) {
        let conn = self.conn();
        users::ensure_user(&conn, user_id, None).unwrap();
        users::set_admin(&conn, user_id).unwrap();
    }

    pub fn state(&self, user_id: i64) -> ConversationState {
        self.sessions.peek(user_id).unwrap()
    }

    fn inbound(&self, user_id: i64, payload: Payload) -> Inbound {
        Inbound {
            user_id,
            username: Some(format!("user{}", user_id)),
            chat_id: user_id,
            payload,
            trigger: Some(MessageRef {
                chat_id: user_id,
                message_id: 0,
            }),
            callback_id: None,
        }
    }

    /// A command or other already-typed event.
    pub async fn send(&self, user_id: i64, event: Event) {
        let inbound = self.inbound(user_id, Payload::Event(event));
        self.dispatch.handle(inbound).await.unwrap();
    }

    pub async fn message(&self, user_id: i64, incoming: Incoming) {
        let inbound = self.inbound(user_id, Payload::Message(incoming));
        self.dispatch.handle(inbound).await.unwrap();
    }

    pub async fn text(&self, user_id: i64, text: &str) {
        self.message(
            user_id,
            Incoming {
                text: Some(text.to_string()),
                ..Default::default()
            },
        )
        .await;
    }

    pub async fn photo(&self, user_id: i64, file_id: &str) {
        self.message(
            user_id,
            Incoming {
                photo: Some(file_id.to_string()),
                ..Default::default()
            },
        )
        .await;
    }

    /// Presses a button on `message`. Returns the callback id used.
    pub async fn press(&self, user_id: i64, action: CallbackAction, message: MessageRef) -> String {
        self.press_data(user_id, &action.to_string(), message).await
    }

    /// Presses a button carrying raw callback data, decoded the way the
    /// dispatcher schema decodes it.
    pub async fn press_data(&self, user_id: i64, data: &str, message: MessageRef) -> String {
        let n = self.callbacks.fetch_add(1, Ordering::SeqCst);
        let callback_id = format!("cb-{}", n);
        let mut inbound = self.inbound(user_id, callback_payload(data));
        inbound.trigger = Some(message);
        inbound.callback_id = Some(callback_id.clone());
        self.dispatch.handle(inbound).await.unwrap();
        callback_id
    }
}

/// Texts sent to `chat_id`, in order.
pub fn texts_to(calls: &[Sent], chat_id: i64) -> Vec<String> {
    calls
        .iter()
        .filter_map(|call| match call {
            Sent::Text { chat_id: to, text, .. } if *to == chat_id => Some(text.clone()),
            _ => None,
        })
        .collect()
}

/// The last text message sent to `chat_id`.
pub fn last_message_to(calls: &[Sent], chat_id: i64) -> MessageRef {
    calls
        .iter()
        .rev()
        .find_map(|call| match call {
            Sent::Text { chat_id: to, message, .. } if *to == chat_id => Some(*message),
            _ => None,
        })
        .unwrap()
}
