//! How a newly inserted row's surrogate key is learned.

use keeper_settings::Provider;
use rusqlite::{Connection, params_from_iter};

use crate::errors::{Result, StoreError};
use crate::querybuilding::{Dialect, Query};

/// Policy for reading back generated keys; fixed for a querier's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdRetrievalStrategy {
    /// Execute, then ask the driver for the last inserted rowid.
    LastInsertId,
    /// The insert itself returns the key as its only column.
    ReturningColumn,
}

impl IdRetrievalStrategy {
    /// Strategy matching how `provider` reports generated keys.
    pub fn for_provider(provider: Provider) -> Self {
        match provider {
            Provider::Postgres => Self::ReturningColumn,
            Provider::Sqlite | Provider::MariaDb => Self::LastInsertId,
        }
    }

    /// Strategy that fits the inserts `dialect` generates: a returning
    /// suffix means the key comes back as a column.
    pub fn for_dialect<D: Dialect + ?Sized>(dialect: &D) -> Self {
        if dialect.returning_id().is_empty() { Self::LastInsertId } else { Self::ReturningColumn }
    }

    /// Run an insert and return the key it generated.
    pub fn insert(self, conn: &Connection, query: &Query) -> Result<u64> {
        let raw = match self {
            Self::LastInsertId => {
                if execute(conn, query)? == 0 {
                    return Err(StoreError::NoRowsModified);
                }
                conn.last_insert_rowid()
            }
            Self::ReturningColumn => conn
                .query_row(&query.sql, params_from_iter(query.args.iter()), |row| row.get::<_, i64>(0))
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => StoreError::NoRowsModified,
                    other => StoreError::Sqlite(other),
                })?,
        };
        u64::try_from(raw).map_err(|_| StoreError::Internal(format!("driver returned negative id {raw}")))
    }
}

/// Execute a statement, returning the affected row count.
pub fn execute(conn: &Connection, query: &Query) -> Result<usize> {
    Ok(conn.execute(&query.sql, params_from_iter(query.args.iter()))?)
}

/// Execute a targeted update; zero affected rows means nothing matched.
pub fn execute_targeted(conn: &Connection, query: &Query) -> Result<()> {
    match execute(conn, query)? {
        0 => Err(StoreError::NoRowsModified),
        _ => Ok(()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
