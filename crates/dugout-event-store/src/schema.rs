//! Event store database schema and pool setup.

use std::str::FromStr;
use std::time::Duration;

use dugout_core::error::DomainError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::config::SqliteStoreConfig;

/// SQL to create the events table.
pub const CREATE_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS stored_events (
    global_position INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id        TEXT NOT NULL UNIQUE,
    stream_id       TEXT NOT NULL,
    aggregate_type  TEXT NOT NULL,
    event_type      TEXT NOT NULL,
    event_data      TEXT NOT NULL,
    event_version   INTEGER NOT NULL,
    stream_version  INTEGER NOT NULL,
    timestamp       TEXT NOT NULL,
    metadata        TEXT NOT NULL,
    game_id         TEXT,
    UNIQUE (stream_id, stream_version)
);

CREATE INDEX IF NOT EXISTS idx_stored_events_stream
    ON stored_events (stream_id, stream_version);

CREATE INDEX IF NOT EXISTS idx_stored_events_aggregate_type
    ON stored_events (aggregate_type);

CREATE INDEX IF NOT EXISTS idx_stored_events_game_id
    ON stored_events (game_id);
";

/// SQL to create the snapshots table.
pub const CREATE_SNAPSHOTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS snapshots (
    aggregate_id   TEXT NOT NULL,
    aggregate_type TEXT NOT NULL,
    version        INTEGER NOT NULL,
    data           TEXT NOT NULL,
    timestamp      TEXT NOT NULL,
    PRIMARY KEY (aggregate_id, version)
);
";

/// Opens a connection pool for `config`, creating the database file if
/// needed.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the URL is invalid or the
/// database cannot be opened.
pub async fn connect_pool(config: &SqliteStoreConfig) -> Result<SqlitePool, DomainError> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| DomainError::Infrastructure(format!("invalid database url: {e}")))?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        // In-memory databases vanish with their last connection.
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(|e| DomainError::Infrastructure(format!("database connection failed: {e}")))
}

/// Creates the events and snapshots tables if they do not exist.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the DDL fails.
pub async fn migrate(pool: &SqlitePool) -> Result<(), DomainError> {
    for ddl in [CREATE_EVENTS_TABLE, CREATE_SNAPSHOTS_TABLE] {
        sqlx::raw_sql(ddl)
            .execute(pool)
            .await
            .map_err(|e| DomainError::Infrastructure(format!("schema migration failed: {e}")))?;
    }
    tracing::debug!("event store schema ready");
    Ok(())
}
