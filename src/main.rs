use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;

use roadpass::approval::ApprovalCoordinator;
use roadpass::cli::{Cli, Commands};
use roadpass::conversation::{SessionStore, StateMachine};
use roadpass::core::logging::log_startup_configuration;
use roadpass::core::{config, init_logger, Authz, PaymentSettings};
use roadpass::storage::{catalog, create_pool, get_connection, users, DbPool};
use roadpass::telegram::{create_bot, schema, setup_bot_commands, Dispatch, HandlerDeps, TeloxideTransport};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Log panics instead of losing them with a dead dispatcher task
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run) | None => run_bot().await,
        Some(Commands::Reindex) => run_reindex(),
        Some(Commands::GrantAdmin { user_id }) => run_grant_admin(user_id),
    }
}

fn open_database() -> Result<Arc<DbPool>> {
    let pool =
        create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;
    Ok(Arc::new(pool))
}

/// Renumber every catalog partition
fn run_reindex() -> Result<()> {
    let db_pool = open_database()?;
    let conn = get_connection(&db_pool)?;
    catalog::reindex_all(&conn)?;
    log::info!("Catalog reindexed");
    Ok(())
}

/// Promote a user to admin from the command line
fn run_grant_admin(user_id: i64) -> Result<()> {
    let db_pool = open_database()?;
    let conn = get_connection(&db_pool)?;
    users::ensure_user(&conn, user_id, None)?;
    users::set_admin(&conn, user_id)?;
    log::info!("User {} is now an admin", user_id);
    Ok(())
}

/// Run the bot with long polling until Ctrl-C
async fn run_bot() -> Result<()> {
    log::info!("Starting bot...");
    log_startup_configuration();

    let db_pool = open_database()?;
    let authz = Authz::from_config();
    {
        let conn = get_connection(&db_pool)?;
        authz.bootstrap(&conn)?;
        catalog::reindex_all(&conn)?;
    }

    let bot = create_bot()?;
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let sessions = Arc::new(SessionStore::from_config());
    let pruner = sessions.clone().spawn_pruner(config::conversation::prune_interval());

    let transport = Arc::new(TeloxideTransport::new(bot.clone()));
    let payment_settings = Arc::new(PaymentSettings::from_config());
    let machine = StateMachine::new(db_pool.clone(), authz.clone(), payment_settings);
    let coordinator = ApprovalCoordinator::new(db_pool.clone(), authz, transport.clone());
    let dispatch = Arc::new(Dispatch::new(db_pool, machine, sessions, coordinator, transport));

    let handler = schema(HandlerDeps::new(dispatch));
    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();

    log::info!("Bot is up, polling for updates");
    Dispatcher::builder(bot, handler)
        .dependencies(DependencyMap::new())
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    pruner.abort();
    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}
