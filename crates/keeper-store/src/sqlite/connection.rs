//! `r2d2` pool over `r2d2_sqlite`.
//!
//! Every connection the pool opens gets WAL journaling, a busy timeout,
//! foreign keys, and a page cache sized by [`ConnectionConfig`].

use std::time::Duration;

use keeper_settings::{DatabaseSettings, Provider};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::debug;

use crate::errors::{Result, StoreError};

/// Pool of `SQLite` connections.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// A connection checked out of a [`ConnectionPool`].
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool tuning.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum open connections.
    pub pool_size: u32,
    /// `PRAGMA busy_timeout`.
    pub busy_timeout_ms: u64,
    /// `PRAGMA cache_size`, in KiB.
    pub cache_size_kib: i64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 16,
            busy_timeout_ms: 30_000,
            cache_size_kib: 8192,
        }
    }
}

impl From<&DatabaseSettings> for ConnectionConfig {
    fn from(settings: &DatabaseSettings) -> Self {
        Self {
            pool_size: settings.pool_size,
            busy_timeout_ms: settings.busy_timeout_ms,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct Pragmas {
    busy_timeout_ms: u64,
    cache_size_kib: i64,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for Pragmas {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = {};\
             PRAGMA foreign_keys = ON;\
             PRAGMA cache_size = -{};\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms, self.cache_size_kib
        ))
    }
}

fn build(manager: SqliteConnectionManager, max_size: u32, config: &ConnectionConfig) -> Result<ConnectionPool> {
    let pool = Pool::builder()
        .max_size(max_size)
        .connection_timeout(CHECKOUT_TIMEOUT)
        .connection_customizer(Box::new(Pragmas {
            busy_timeout_ms: config.busy_timeout_ms,
            cache_size_kib: config.cache_size_kib,
        }))
        .build(manager)?;
    Ok(pool)
}

/// In-memory pool. Each in-memory connection is its own database, so the
/// pool holds exactly one regardless of `config.pool_size`.
pub fn new_in_memory(config: &ConnectionConfig) -> Result<ConnectionPool> {
    build(SqliteConnectionManager::memory(), 1, config)
}

/// File-backed pool.
pub fn new_file(path: &str, config: &ConnectionConfig) -> Result<ConnectionPool> {
    build(SqliteConnectionManager::file(path), config.pool_size, config)
}

/// Pool for the configured database. Only `SQLite` has a driver; other
/// providers are rejected.
pub fn open(settings: &DatabaseSettings) -> Result<ConnectionPool> {
    if settings.provider != Provider::Sqlite {
        return Err(StoreError::InvalidInput(format!(
            "no driver available for provider {}",
            settings.provider
        )));
    }
    let config = ConnectionConfig::from(settings);
    debug!(
        connection = %settings.connection_details,
        pool_size = config.pool_size,
        "opening sqlite pool"
    );
    if settings.is_in_memory() {
        new_in_memory(&config)
    } else {
        new_file(&settings.connection_details, &config)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
