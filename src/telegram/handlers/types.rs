//! Handler types and dependencies

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::Message;

use crate::telegram::dispatch::{Dispatch, Inbound, Payload};
use crate::telegram::transport::MessageRef;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub dispatch: Arc<Dispatch>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(dispatch: Arc<Dispatch>) -> Self {
        Self { dispatch }
    }
}

/// Sender of a message, `None` for channel posts and anonymous admins.
pub fn sender_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok())
}

/// Wraps a private-chat message for the dispatch front.
pub fn inbound_from_message(msg: &Message, payload: Payload) -> Option<Inbound> {
    let user_id = sender_id(msg)?;
    Some(Inbound {
        user_id,
        username: msg.from.as_ref().and_then(|u| u.username.clone()),
        chat_id: msg.chat.id.0,
        payload,
        trigger: Some(MessageRef {
            chat_id: msg.chat.id.0,
            message_id: msg.id.0,
        }),
        callback_id: None,
    })
}

/// Wraps a button press for the dispatch front.
pub fn inbound_from_callback(q: &CallbackQuery, payload: Payload) -> Option<Inbound> {
    let user_id = i64::try_from(q.from.id.0).ok()?;
    let trigger = q.message.as_ref().map(|m| MessageRef {
        chat_id: m.chat().id.0,
        message_id: m.id().0,
    });
    Some(Inbound {
        user_id,
        username: q.from.username.clone(),
        chat_id: trigger.map(|t| t.chat_id).unwrap_or(user_id),
        payload,
        trigger,
        callback_id: Some(q.id.0.clone()),
    })
}
