//! Telegram bot handler tree configuration
//!
//! This module provides the main dispatcher schema for the Telegram bot.
//! Every branch reduces its update to an [`Inbound`](crate::telegram::dispatch::Inbound)
//! and hands it to the dispatch front, so the tree stays thin.

mod schema;
mod types;

pub use schema::schema;
pub use types::{inbound_from_callback, inbound_from_message, sender_id, HandlerDeps, HandlerError};
