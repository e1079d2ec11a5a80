//! Core utilities, configuration, and common functionality

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod payment_settings;

// Re-exports for convenience
pub use auth::{Authz, Role};
pub use error::{AppError, AppResult};
pub use logging::init_logger;
pub use payment_settings::PaymentSettings;
