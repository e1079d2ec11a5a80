//! Roadpass - Telegram bot for driving-exam preparation
//!
//! Users browse a catalog of exam questions, road signs and truck parts in
//! their language once an admin has approved their payment proof.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, authorization, payment settings
//! - `storage`: SQLite pool, migrations and the user, catalog and payment stores
//! - `conversation`: the per-user state machine and session store
//! - `approval`: payment announcements and admin decisions
//! - `telegram`: update intake, keyboards and the Bot API transport

pub mod approval;
pub mod cli;
pub mod conversation;
pub mod core;
pub mod i18n;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use approval::{ApprovalCoordinator, DecideOutcome};
pub use core::{config, AppError, AppResult};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
