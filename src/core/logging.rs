//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - A startup summary of the effective configuration

use anyhow::Result;
use simplelog::*;
use std::fs::OpenOptions;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// The log file is opened in append mode so restarts keep history.
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to open the file or a logger is already installed
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .map_err(|e| anyhow::anyhow!("Failed to open log file {}: {}", log_file_path, e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective configuration once at startup. Secrets are never printed.
pub fn log_startup_configuration() {
    log::info!("Database: {}", *config::DATABASE_PATH);
    log::info!("Log file: {}", *config::LOG_FILE_PATH);

    if config::BOT_TOKEN.is_empty() {
        log::warn!("BOT_TOKEN is not set; the bot will fail to authenticate");
    }
    if let Some(url) = config::BOT_API_URL.as_deref() {
        log::info!("Using custom Bot API server: {}", url);
    }

    if config::admin::SUPER_ADMIN_IDS.is_empty() {
        log::warn!("ADMIN_IDS is empty: nobody can promote admins or approve payments until one is granted via CLI");
    } else {
        log::info!("Super-admins configured: {}", config::admin::SUPER_ADMIN_IDS.len());
    }

    log::info!("Default payment amount: {:.2}", *config::payment::DEFAULT_AMOUNT);

    match *config::conversation::IDLE_TIMEOUT {
        Some(timeout) => log::info!("Conversation idle timeout: {}s", timeout.as_secs()),
        None => log::info!("Conversation idle timeout: disabled"),
    }
}
