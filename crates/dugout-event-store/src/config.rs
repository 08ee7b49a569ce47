//! Store configuration read from the environment.

use std::path::Path;

use thiserror::Error;

/// Environment variable holding the SQLite database URL.
pub const DATABASE_URL_VAR: &str = "DUGOUT_DATABASE_URL";
/// Environment variable holding the maximum pool size.
pub const MAX_CONNECTIONS_VAR: &str = "DUGOUT_DB_MAX_CONNECTIONS";
/// Environment variable holding the snapshot frequency.
pub const SNAPSHOT_FREQUENCY_VAR: &str = "DUGOUT_SNAPSHOT_FREQUENCY";

const DEFAULT_DATABASE_URL: &str = "sqlite://dugout.db?mode=rwc";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SNAPSHOT_FREQUENCY: u64 = 10;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("configuration error: {name} must be {expected}, got {value:?}")]
    Invalid {
        /// The offending variable.
        name: &'static str,
        /// What a valid value looks like.
        expected: &'static str,
        /// The value found.
        value: String,
    },
}

/// Connection settings for [`crate::SqliteEventStore`] and
/// [`crate::SqliteSnapshotStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteStoreConfig {
    /// `SQLite` connection URL.
    pub database_url: String,
    /// Maximum number of pooled connections.
    pub max_connections: u32,
}

impl SqliteStoreConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, falling back to defaults for
    /// unset variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a variable is set but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup(DATABASE_URL_VAR)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned());
        let max_connections = match lookup(MAX_CONNECTIONS_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    name: MAX_CONNECTIONS_VAR,
                    expected: "a positive integer",
                    value: raw,
                })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        Ok(Self {
            database_url,
            max_connections,
        })
    }

    /// A private in-memory database. A single connection, since every
    /// `SQLite` in-memory connection is its own database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_owned(),
            max_connections: 1,
        }
    }

    /// A database file at `path`, created if missing.
    #[must_use]
    pub fn at_path(path: &Path) -> Self {
        Self {
            database_url: format!("sqlite://{}", path.display()),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Snapshot policy settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotConfig {
    /// Stream versions between snapshots; 0 disables snapshots.
    pub frequency: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            frequency: DEFAULT_SNAPSHOT_FREQUENCY,
        }
    }
}

impl SnapshotConfig {
    /// Reads the snapshot policy from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the frequency is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the snapshot policy through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the frequency is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        match lookup(SNAPSHOT_FREQUENCY_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(|frequency| Self { frequency })
                .map_err(|_| ConfigError::Invalid {
                    name: SNAPSHOT_FREQUENCY_VAR,
                    expected: "a non-negative integer",
                    value: raw,
                }),
            None => Ok(Self::default()),
        }
    }
}
