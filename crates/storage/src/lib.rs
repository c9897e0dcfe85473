//! Storage layer: card data model, store traits and their backends.
//!
//! Holds SQLite pool setup, the migration runner, an in-memory backend and
//! a SQLite backend for cards, order hints and preferences.

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

pub mod memory;
pub mod models;
pub mod sqlite;
pub mod store;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{CardStore, OrderStore, PrefStore, StoreError};

/// Accepts a `sqlite:` URL or a plain file path. Paths get their parent
/// directories created and the database file is created on first open.
fn connect_options(location: &str) -> anyhow::Result<SqliteConnectOptions> {
    if location.starts_with("sqlite:") {
        let opts = SqliteConnectOptions::from_str(location)
            .with_context(|| format!("invalid database url {location}"))?;
        return Ok(opts.create_if_missing(true));
    }
    let path = Path::new(location);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    Ok(SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true))
}

/// In-memory databases live per connection, so they get a single one.
pub async fn connect(location: &str) -> anyhow::Result<SqlitePool> {
    let max_connections = if location.contains(":memory:") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(connect_options(location)?)
        .await
        .with_context(|| format!("opening card database {location}"))?;
    tracing::debug!(location, max_connections, "card database connected");
    Ok(pool)
}

/// Brings the card schema up to date. Already-applied steps are skipped.
pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("migrating card database")?;
    Ok(())
}
