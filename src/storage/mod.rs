//! Persistence: connection pool, migrations and the three stores

pub mod catalog;
pub mod db;
pub mod migrations;
pub mod payments;
pub mod settings;
pub mod users;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};

/// Fresh in-memory database with the full schema, for unit tests.
#[cfg(test)]
pub(crate) fn test_conn() -> rusqlite::Connection {
    let mut conn = rusqlite::Connection::open_in_memory().expect("open in-memory sqlite");
    conn.execute_batch("PRAGMA foreign_keys = ON;").expect("enable foreign keys");
    migrations::run_migrations(&mut conn).expect("migrate in-memory sqlite");
    conn
}
