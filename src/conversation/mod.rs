//! Per-user conversation handling, independent of the transport.

pub mod event;
pub mod machine;
pub mod reply;
pub mod state;
pub mod store;

pub use event::{AdminCommand, CallbackAction, Decision, Event};
pub use machine::StateMachine;
pub use reply::{Effect, Markup, Reply, Transition};
pub use state::{ConversationState, StateTag};
pub use store::{SessionLock, SessionStore};
