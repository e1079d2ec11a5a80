//! The dispatch front: one inbound update in, the user's session advanced,
//! replies and side effects carried out.
//!
//! Per update:
//! 1. the sender is registered (new users are announced to super-admins)
//! 2. the sender's session lock is taken, serializing their updates
//! 3. the state machine computes the transition
//! 4. replies are rendered, the new state stored and the lock released
//! 5. effects (admin cards, decisions) run outside the lock
//!
//! A button press is always answered so the client stops its spinner.

use std::sync::Arc;

use teloxide::types::Message;
use teloxide::utils::html;

use crate::approval::ApprovalCoordinator;
use crate::conversation::event::{CallbackAction, Event};
use crate::conversation::reply::{Effect, Reply};
use crate::conversation::{SessionStore, StateMachine};
use crate::core::error::AppResult;
use crate::i18n::{args, t, t_args, Language};
use crate::storage::db::{self, DbPool};
use crate::storage::users;
use crate::telegram::transport::{MessageRef, Transport};

/// What a message carries, without the Telegram envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Incoming {
    pub text: Option<String>,
    pub photo: Option<String>,
    pub audio: Option<String>,
    pub forwarded: bool,
}

impl Incoming {
    pub fn from_message(msg: &Message) -> Self {
        let photo = msg
            .photo()
            .and_then(|sizes| sizes.iter().max_by_key(|p| p.width * p.height))
            .map(|p| p.file.id.0.clone());
        let audio = msg
            .audio()
            .map(|a| a.file.id.0.clone())
            .or_else(|| msg.voice().map(|v| v.file.id.0.clone()));
        Self {
            text: msg.text().map(str::to_string),
            photo,
            audio,
            forwarded: msg.forward_origin().is_some(),
        }
    }

    /// Forwarded content is only accepted from admins, who may forward
    /// catalog material into an add flow.
    pub fn into_event(self, sender_is_admin: bool) -> Event {
        if self.forwarded && !sender_is_admin {
            return Event::Forwarded;
        }
        if let Some(file_id) = self.photo {
            return Event::Photo { file_id };
        }
        if let Some(file_id) = self.audio {
            return Event::Audio { file_id };
        }
        match self.text {
            Some(text) => Event::Text(text),
            None => Event::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Event(Event),
    Message(Incoming),
}

/// One update, reduced to what the conversation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub user_id: i64,
    pub username: Option<String>,
    pub chat_id: i64,
    pub payload: Payload,
    /// The message that carried the update (or the pressed button).
    pub trigger: Option<MessageRef>,
    pub callback_id: Option<String>,
}

pub struct Dispatch {
    db_pool: Arc<DbPool>,
    machine: StateMachine,
    sessions: Arc<SessionStore>,
    coordinator: ApprovalCoordinator,
    transport: Arc<dyn Transport>,
}

impl Dispatch {
    pub fn new(
        db_pool: Arc<DbPool>,
        machine: StateMachine,
        sessions: Arc<SessionStore>,
        coordinator: ApprovalCoordinator,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            db_pool,
            machine,
            sessions,
            coordinator,
            transport,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub async fn handle(&self, inbound: Inbound) -> AppResult<()> {
        let (event, lang, is_new) = self.register(&inbound)?;
        if is_new {
            self.announce_new_user(&inbound).await;
        }

        let mut session = self.sessions.lock(inbound.user_id).await;
        let state = session.take();
        let expired = session.was_expired();
        let transition = self.machine.handle(inbound.user_id, state, event);

        let mut answered = false;
        if expired {
            self.render(&inbound, Reply::text(t(lang, "session-expired")), &mut answered)
                .await;
        }
        for reply in transition.replies {
            self.render(&inbound, reply, &mut answered).await;
        }
        session.set(transition.next);
        drop(session);

        if let (Some(callback_id), false) = (inbound.callback_id.as_deref(), answered) {
            if let Err(e) = self.transport.answer_callback(callback_id, None).await {
                log::debug!("Failed to answer callback for user {}: {}", inbound.user_id, e);
            }
        }

        for effect in transition.effects {
            if let Err(e) = self.run_effect(inbound.user_id, effect).await {
                log::error!("Effect for user {} failed: {}", inbound.user_id, e);
            }
        }
        Ok(())
    }

    /// Registers the sender and resolves the event. Returns the event, the
    /// sender's language and whether this is their first contact.
    fn register(&self, inbound: &Inbound) -> AppResult<(Event, Language, bool)> {
        let conn = db::get_connection(&self.db_pool)?;
        let is_new = users::ensure_user(&conn, inbound.user_id, inbound.username.as_deref())?;
        users::touch_last_active(&conn, inbound.user_id)?;
        let event = match &inbound.payload {
            Payload::Event(event) => event.clone(),
            Payload::Message(incoming) => {
                let is_admin = incoming.forwarded && self.machine.authz().is_admin(&conn, inbound.user_id)?;
                incoming.clone().into_event(is_admin)
            }
        };
        Ok((event, users::get_language(&conn, inbound.user_id)?, is_new))
    }

    async fn announce_new_user(&self, inbound: &Inbound) {
        let username = inbound
            .username
            .as_deref()
            .map(|u| format!("@{}", u))
            .unwrap_or_else(|| "-".to_string());
        let recipients: Vec<(i64, Language)> = match db::get_connection(&self.db_pool) {
            Ok(conn) => self
                .machine
                .authz()
                .super_admins()
                .map(|id| (id, users::get_language(&conn, id).unwrap_or_default()))
                .collect(),
            Err(e) => {
                log::warn!("New user {} not announced: {}", inbound.user_id, e);
                return;
            }
        };
        for (admin_id, lang) in recipients {
            let text = t_args(
                lang,
                "new-user-notice",
                &args([
                    ("username", html::escape(&username)),
                    ("user_id", inbound.user_id.to_string()),
                ]),
            );
            if let Err(e) = self.transport.send_text(admin_id, &text, &Default::default()).await {
                log::warn!("Failed to tell admin {} about new user {}: {}", admin_id, inbound.user_id, e);
            }
        }
    }

    async fn render(&self, inbound: &Inbound, reply: Reply, answered: &mut bool) {
        let chat_id = inbound.chat_id;
        let result = match reply {
            Reply::Text { text, markup } => self.transport.send_text(chat_id, &text, &markup).await.map(|_| ()),
            Reply::Photo {
                file_id,
                caption,
                markup,
            } => self
                .transport
                .send_photo(chat_id, &file_id, caption.as_deref(), &markup)
                .await
                .map(|_| ()),
            Reply::Audio { file_id, caption } => self
                .transport
                .send_audio(chat_id, &file_id, caption.as_deref())
                .await
                .map(|_| ()),
            Reply::EditTrigger { text, markup } => match inbound.trigger {
                Some(trigger) if inbound.callback_id.is_some() => {
                    self.transport.edit_message_text(trigger, &text, &markup).await
                }
                _ => self.transport.send_text(chat_id, &text, &markup).await.map(|_| ()),
            },
            Reply::DeleteTrigger => match inbound.trigger {
                Some(trigger) => self.transport.delete_message(trigger).await,
                None => Ok(()),
            },
            Reply::Alert(text) => match inbound.callback_id.as_deref() {
                Some(callback_id) => {
                    *answered = true;
                    self.transport.answer_callback(callback_id, Some(&text)).await
                }
                None => self.transport.send_text(chat_id, &text, &Default::default()).await.map(|_| ()),
            },
        };
        if let Err(e) = result {
            log::warn!("Reply to user {} failed: {}", inbound.user_id, e);
        }
    }

    async fn run_effect(&self, user_id: i64, effect: Effect) -> AppResult<()> {
        match effect {
            Effect::AnnounceSubmission(submission) => {
                self.coordinator.announce(&submission).await?;
            }
            Effect::ShowPendingPayments => {
                self.coordinator.show_pending(user_id).await?;
            }
            Effect::Decide { target, decision } => {
                self.coordinator.decide_and_report(user_id, target, decision).await?;
            }
        }
        Ok(())
    }
}

/// Payload of a pressed button. Data that does not decode (a button from an
/// older keyboard layout, a tampered client) still reaches the machine as
/// [`Event::Other`], which restates the current prompt.
pub fn callback_payload(data: &str) -> Payload {
    match data.parse::<CallbackAction>() {
        Ok(action) => Payload::Event(Event::Callback(action)),
        Err(e) => {
            log::debug!("{}", e);
            Payload::Event(Event::Other)
        }
    }
}
