use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Configuration read once at startup from the environment (after `.env` is loaded).
///
/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: roadpass.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "roadpass.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: roadpass.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "roadpass.log".to_string()));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Custom Bot API server (local telegram-bot-api), if any
/// Read from BOT_API_URL environment variable
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok().filter(|s| !s.is_empty()));

/// Administrator configuration
pub mod admin {
    use once_cell::sync::Lazy;
    use std::env;

    /// Splits a raw id list on commas and whitespace, ignoring garbage entries.
    pub fn parse_admin_ids(raw: &str) -> Vec<i64> {
        raw.split([',', ' ', '\n', '\t'])
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect()
    }

    /// Super-admin user IDs (comma-separated)
    /// Read from ADMIN_IDS environment variable
    pub static SUPER_ADMIN_IDS: Lazy<Vec<i64>> = Lazy::new(|| {
        env::var("ADMIN_IDS")
            .ok()
            .map(|raw| parse_admin_ids(&raw))
            .unwrap_or_default()
    });
}

/// Payment configuration
pub mod payment {
    use once_cell::sync::Lazy;
    use std::env;

    /// Amount used until an admin sets one at runtime
    pub const FALLBACK_AMOUNT: f64 = 14.09;

    /// Default payment amount
    /// Read from PAYMENT_AMOUNT environment variable
    /// Non-positive or unparsable values fall back to FALLBACK_AMOUNT
    pub static DEFAULT_AMOUNT: Lazy<f64> = Lazy::new(|| {
        env::var("PAYMENT_AMOUNT")
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(FALLBACK_AMOUNT)
    });

    const DEFAULT_CARD_DETAILS: &str = "Uzcard: 5614 6818 1201 1462\nVisa: 4231 2000 0805 3422";
    const DEFAULT_CARD_OWNER: &str = "Umedjon Mirbakayev";

    /// Card numbers shown in the payment instructions, one per line
    /// Read from PAYMENT_CARD_DETAILS environment variable
    pub fn read_card_details() -> String {
        env::var("PAYMENT_CARD_DETAILS")
            .map(|s| s.replace("\\n", "\n"))
            .unwrap_or_else(|_| DEFAULT_CARD_DETAILS.to_string())
    }

    /// Card owner shown in the payment instructions
    /// Read from PAYMENT_CARD_OWNER environment variable
    pub fn read_card_owner() -> String {
        env::var("PAYMENT_CARD_OWNER").unwrap_or_else(|_| DEFAULT_CARD_OWNER.to_string())
    }
}

/// Conversation configuration
pub mod conversation {
    use super::Duration;
    use once_cell::sync::Lazy;
    use std::env;

    /// Default idle timeout for multi-step flows (in seconds)
    pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 1800;

    /// Idle timeout after which an abandoned flow is reset to idle
    /// Read from CONVERSATION_IDLE_TIMEOUT_SECS environment variable
    /// `0` disables expiry
    pub static IDLE_TIMEOUT: Lazy<Option<Duration>> = Lazy::new(|| {
        let secs = env::var("CONVERSATION_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS);
        (secs > 0).then(|| Duration::from_secs(secs))
    });

    /// Interval between sweeps of the in-memory session map (in seconds)
    pub const PRUNE_INTERVAL_SECS: u64 = 300;

    /// Session prune interval duration
    pub fn prune_interval() -> Duration {
        Duration::from_secs(PRUNE_INTERVAL_SECS)
    }
}

/// Catalog presentation configuration
pub mod catalog {
    /// Items per listing page
    pub const PAGE_SIZE: usize = 10;

    /// Maximum characters of an item shown on its listing button
    pub const PREVIEW_CHARS: usize = 50;
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API requests (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}
