//! Telegram bot integration: update intake, rendering and the Bot API transport.

pub mod bot;
pub mod dispatch;
pub mod handlers;
pub mod keyboards;
pub mod transport;

pub type Bot = teloxide::Bot;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use dispatch::{Dispatch, Inbound, Incoming, Payload};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use transport::{MessageRef, TeloxideTransport, Transport};
