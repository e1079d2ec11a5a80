//! Common test utilities
//!
//! This module is shared across all integration tests

pub mod fixtures;
pub mod recorder;

#[allow(unused_imports)]
pub use fixtures::{last_message_to, texts_to, TestEnvironment, ADMIN, SUPER, USER};
#[allow(unused_imports)]
pub use recorder::{RecordingTransport, Sent};
