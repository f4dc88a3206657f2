//! Schema migrations.
//!
//! Each backend ships its own ordered list, embedded with [`include_str!`].
//! The runner records applied versions in `schema_version` and runs every
//! pending migration in its own transaction, so re-running is a no-op and a
//! failure leaves no partial schema behind.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::{Result, StoreError};

/// One schema step.
#[derive(Debug)]
pub struct Migration {
    /// Monotonic version number.
    pub version: u32,
    /// Short description recorded alongside the version.
    pub description: &'static str,
    /// Statements to execute.
    pub sql: &'static str,
}

/// `SQLite` migrations.
pub const SQLITE: &[Migration] = &[
    Migration {
        version: 1,
        description: "core tables",
        sql: include_str!("sqlite/v001_schema.sql"),
    },
    Migration {
        version: 2,
        description: "ownership and audit log indexes",
        sql: include_str!("sqlite/v002_indexes.sql"),
    },
];

/// PostgreSQL migrations.
pub const POSTGRES: &[Migration] = &[Migration {
    version: 1,
    description: "core tables and indexes",
    sql: include_str!("postgres/v001_schema.sql"),
}];

/// MariaDB migrations.
pub const MARIADB: &[Migration] = &[Migration {
    version: 1,
    description: "core tables",
    sql: include_str!("mariadb/v001_schema.sql"),
}];

/// Apply every migration newer than the recorded version. Returns how many ran.
pub fn run_migrations(conn: &Connection, migrations: &[Migration]) -> Result<u32> {
    ensure_version_table(conn)?;
    let current = current_version(conn)?;
    let mut applied = 0;

    for migration in migrations {
        if migration.version <= current {
            debug!(version = migration.version, "migration already applied");
            continue;
        }
        info!(
            version = migration.version,
            description = migration.description,
            "applying migration"
        );
        apply(conn, migration)?;
        applied += 1;
    }

    if applied > 0 {
        info!(applied, "migrations complete");
    }
    Ok(applied)
}

/// Highest applied version, or 0.
pub fn current_version(conn: &Connection) -> Result<u32> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
        row.get(0)
    })
    .map_err(|e| StoreError::Migration {
        message: format!("reading schema_version: {e}"),
    })
}

fn ensure_version_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
           version     INTEGER PRIMARY KEY,
           applied_at  TEXT    NOT NULL,
           description TEXT
         );",
    )
    .map_err(|e| StoreError::Migration {
        message: format!("creating schema_version: {e}"),
    })
}

fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    let fail = |what: &str, e: rusqlite::Error| StoreError::Migration {
        message: format!("v{:03} ({}) {what}: {e}", migration.version, migration.description),
    };

    let tx = conn.unchecked_transaction().map_err(|e| fail("begin", e))?;
    tx.execute_batch(migration.sql).map_err(|e| fail("failed", e))?;
    let _ = tx
        .execute(
            "INSERT INTO schema_version (version, applied_at, description) VALUES (?1, datetime('now'), ?2)",
            rusqlite::params![migration.version, migration.description],
        )
        .map_err(|e| fail("recording version", e))?;
    tx.commit().map_err(|e| fail("commit", e))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
