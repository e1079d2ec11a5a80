//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{inbound_from_callback, inbound_from_message, HandlerDeps, HandlerError};
use crate::telegram::bot::Command;
use crate::telegram::dispatch::{callback_payload, Incoming, Payload};

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Only private chats are served. Commands are matched before plain
/// messages, so `/cancel` and `/skip` never reach a flow as text.
///
/// # Arguments
/// * `deps` - Handler dependencies
///
/// # Returns
/// The complete handler tree for the bot
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry()
        .branch(command_handler(deps.clone()))
        .branch(message_handler(deps.clone()))
        .branch(callback_handler(deps))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .filter_command::<Command>()
        .endpoint(move |msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("Received command {:?} from chat {}", cmd, msg.chat.id);
                let Some(inbound) = inbound_from_message(&msg, Payload::Event(cmd.into_event())) else {
                    return Ok(());
                };
                deps.dispatch.handle(inbound).await?;
                Ok(())
            }
        })
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .endpoint(move |msg: Message| {
            let deps = deps.clone();
            async move {
                let payload = Payload::Message(Incoming::from_message(&msg));
                let Some(inbound) = inbound_from_message(&msg, payload) else {
                    return Ok(());
                };
                deps.dispatch.handle(inbound).await?;
                Ok(())
            }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            let payload = callback_payload(q.data.as_deref().unwrap_or_default());
            let Some(inbound) = inbound_from_callback(&q, payload) else {
                return Ok(());
            };
            deps.dispatch.handle(inbound).await?;
            Ok(())
        }
    })
}
