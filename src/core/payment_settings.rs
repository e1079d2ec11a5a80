//! Runtime payment configuration.
//!
//! The amount lives in the `settings` table and is cached in memory. `set`
//! writes through and drops the cache, so any reader after a successful `set`
//! sees the new value. Every invalidation bumps a generation; a reader only
//! fills the cache if no invalidation happened since it started loading, so a
//! value read before a `set` can never be cached after it. Destination details are re-read from the environment on
//! [`PaymentSettings::reload`].

use std::sync::{PoisonError, RwLock};

use rusqlite::Connection;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::settings::{self, PAYMENT_AMOUNT_KEY};

/// Where users send the money.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDestination {
    pub cards: String,
    pub owner: String,
}

impl PaymentDestination {
    pub fn from_env() -> Self {
        Self {
            cards: config::payment::read_card_details(),
            owner: config::payment::read_card_owner(),
        }
    }
}

#[derive(Debug, Default)]
struct AmountCache {
    amount: Option<f64>,
    generation: u64,
}

#[derive(Debug)]
pub struct PaymentSettings {
    default_amount: f64,
    cached: RwLock<AmountCache>,
    destination: RwLock<PaymentDestination>,
}

impl PaymentSettings {
    pub fn new(default_amount: f64, destination: PaymentDestination) -> Self {
        Self {
            default_amount,
            cached: RwLock::new(AmountCache::default()),
            destination: RwLock::new(destination),
        }
    }

    pub fn from_config() -> Self {
        Self::new(*config::payment::DEFAULT_AMOUNT, PaymentDestination::from_env())
    }

    /// Current amount: cache, then the settings table, then the configured default.
    pub fn get(&self, conn: &Connection) -> AppResult<f64> {
        let generation = {
            let cache = self.cached.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(amount) = cache.amount {
                return Ok(amount);
            }
            cache.generation
        };

        let amount = self.load(conn)?;
        self.fill(generation, amount);
        Ok(amount)
    }

    fn load(&self, conn: &Connection) -> AppResult<f64> {
        let stored = settings::get_setting(conn, PAYMENT_AMOUNT_KEY)?
            .and_then(|raw| raw.parse::<f64>().ok())
            .filter(|v| is_valid_amount(*v));
        Ok(stored.unwrap_or(self.default_amount))
    }

    /// Caches `amount` unless the cache was invalidated after `generation` was read.
    fn fill(&self, generation: u64, amount: f64) {
        let mut cache = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        if cache.generation == generation {
            cache.amount = Some(amount);
        }
    }

    fn generation(&self) -> u64 {
        self.cached.read().unwrap_or_else(PoisonError::into_inner).generation
    }

    /// Validates, persists and invalidates. Invalid amounts change nothing.
    pub fn set(&self, conn: &Connection, amount: f64) -> AppResult<f64> {
        if !is_valid_amount(amount) {
            return Err(AppError::Validation(format!("payment amount must be positive, got {}", amount)));
        }
        settings::set_setting(conn, PAYMENT_AMOUNT_KEY, &amount.to_string())?;
        self.invalidate();
        log::info!("Payment amount set to {:.2}", amount);
        Ok(amount)
    }

    /// Parses admin input ("15", "15.5", "15,5") and applies it with [`set`](Self::set).
    pub fn set_from_text(&self, conn: &Connection, input: &str) -> AppResult<f64> {
        let amount = parse_amount(input)
            .ok_or_else(|| AppError::Validation(format!("not a number: {:?}", input)))?;
        self.set(conn, amount)
    }

    pub fn invalidate(&self) {
        let mut cache = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        cache.amount = None;
        cache.generation += 1;
    }

    pub fn destination(&self) -> PaymentDestination {
        self.destination.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Re-reads `.env` and the destination variables, then drops the amount cache.
    pub fn reload(&self) {
        if let Err(e) = dotenvy::dotenv_override() {
            log::debug!("No .env reloaded: {}", e);
        }
        *self.destination.write().unwrap_or_else(PoisonError::into_inner) = PaymentDestination::from_env();
        self.invalidate();
        log::info!("Payment settings reloaded");
    }
}

fn is_valid_amount(amount: f64) -> bool {
    amount.is_finite() && amount > 0.0
}

pub fn parse_amount(input: &str) -> Option<f64> {
    input.trim().replace(',', ".").parse::<f64>().ok()
}
