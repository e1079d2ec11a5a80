use thiserror::Error;

/// Centralized error types for the application
///
/// Variants fall into four groups that drive how a failing conversation step
/// is surfaced to the user:
/// - `Validation`: malformed input, the user is re-prompted
/// - `NotFound`: a stale reference (deleted item, already-decided payment)
/// - `Unauthorized`: a non-admin reached an admin-only action
/// - everything else: store or transport failure, logged and reset to idle
///
/// # Example
///
/// ```no_run
/// use roadpass::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Schema migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] refinery::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// Malformed user input
    #[error("Validation error: {0}")]
    Validation(String),

    /// The referenced record does not exist (or is no longer in the expected state)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The acting user lacks the required role
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl AppError {
    /// True for failures of the persistence or transport layer, as opposed to
    /// problems with the request itself.
    pub fn is_infrastructure(&self) -> bool {
        !matches!(
            self,
            AppError::Validation(_) | AppError::NotFound(_) | AppError::Unauthorized(_)
        )
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
