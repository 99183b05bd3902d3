//! Shared SQLite connection pool.
//!
//! Thread and task stores share one bounded pool. Every query checks a
//! connection out for its own duration; a caller that cannot get one within
//! the acquire timeout gets [`StoreError::Unavailable`].

use fbot_core::error::StoreError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Pool sizing.
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 15,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Open (creating if missing) the database at `url`.
///
/// `sqlite::memory:` databases are private to a connection, so the pool is
/// pinned to a single connection for them.
pub async fn open_pool(url: &str, settings: PoolSettings) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(url)
        .map_err(|e| StoreError::Storage(format!("Invalid SQLite URL: {e}")))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    let in_memory = url.contains(":memory:");
    if !in_memory
        && let Some(parent) = options.get_filename().parent().filter(|p| !p.as_os_str().is_empty())
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to create {}: {e}", parent.display())))?;
    }

    let max_connections = if in_memory { 1 } else { settings.max_connections.max(1) };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect_with(options)
        .await
        .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

    info!(max_connections, "SQLite pool opened");
    Ok(pool)
}

/// Map a sqlx error onto the store taxonomy, with `context` naming the query.
pub(crate) fn query_error(context: &str, e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut => StoreError::Unavailable(format!("{context}: no database connection available")),
        sqlx::Error::PoolClosed => StoreError::Unavailable(format!("{context}: database pool closed")),
        other => StoreError::QueryFailed(format!("{context}: {other}")),
    }
}
