//! Error types for the querier.
//!
//! [`StoreError`] is returned by every engine operation. [`StoreError::kind`]
//! collapses it into the four categories a service layer maps to responses:
//! bad input and missing rows are the caller's problem, infrastructure and
//! data-integrity failures are ours.

use thiserror::Error;

/// Errors raised by querier operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required identifier was the absent sentinel (zero) or larger than
    /// any key the database can hold.
    #[error("invalid identifier: {0} must be between 1 and i64::MAX")]
    InvalidIdentifier(&'static str),

    /// A required argument was missing or unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A point read found nothing.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A targeted write matched zero rows.
    #[error("no rows modified")]
    NoRowsModified,

    /// A read or write step failed; carries the step name and the statement it ran.
    #[error("{step}: {source}")]
    Step {
        /// Name of the failed step, e.g. `"writing audit log entry"` or `"listing rows"`.
        step: &'static str,
        /// Statement text of the failed step.
        statement: String,
        /// Underlying failure.
        #[source]
        source: Box<StoreError>,
    },

    /// A row could not be scanned into its entity.
    #[error("row decode failed: {0}")]
    RowDecode(#[source] rusqlite::Error),

    /// A stored value could not be parsed into its expected shape.
    #[error("data integrity: column {column} holds {value:?}: {reason}")]
    DataIntegrity {
        /// Column being decoded.
        column: &'static str,
        /// Offending stored value.
        value: String,
        /// Parse failure description.
        reason: String,
    },

    /// `SQLite` error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON (de)serialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Which migration failed and why.
        message: String,
    },

    /// The database never answered the readiness probe.
    #[error("database not ready")]
    Unready,

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal failure such as a panicked blocking task.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias for querier operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Coarse classification of a [`StoreError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rejected before any I/O.
    InvalidInput,
    /// Nothing matched.
    NotFound,
    /// Connectivity, transaction or decode failure.
    Infrastructure,
    /// Stored data has the wrong shape.
    DataIntegrity,
    /// Caller gave up.
    Cancelled,
}

impl StoreError {
    /// Wrap `source` as the failure of a named step.
    pub fn step(step: &'static str, statement: impl Into<String>, source: impl Into<StoreError>) -> Self {
        Self::Step {
            step,
            statement: statement.into(),
            source: Box::new(source.into()),
        }
    }

    /// Classify the error, looking through step wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentifier(_) | Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) | Self::NoRowsModified => ErrorKind::NotFound,
            Self::Step { source, .. } => source.kind(),
            Self::DataIntegrity { .. } => ErrorKind::DataIntegrity,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Sqlite(err) => sqlite_kind(err),
            Self::RowDecode(_)
            | Self::Pool(_)
            | Self::Serde(_)
            | Self::Migration { .. }
            | Self::Unready
            | Self::Internal(_) => ErrorKind::Infrastructure,
        }
    }

    /// Whether nothing matched the operation.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Whether retrying the whole logical operation could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Step { source, .. } => source.is_retryable(),
            Self::RowDecode(_) | Self::Serde(_) | Self::Migration { .. } | Self::Internal(_) => false,
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy
                    | rusqlite::ErrorCode::DatabaseLocked
                    | rusqlite::ErrorCode::SystemIoFailure
                    | rusqlite::ErrorCode::CannotOpen
            ),
            Self::Sqlite(_) => false,
            other => other.kind() == ErrorKind::Infrastructure,
        }
    }
}

fn sqlite_kind(err: &rusqlite::Error) -> ErrorKind {
    match err {
        rusqlite::Error::QueryReturnedNoRows => ErrorKind::NotFound,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::OperationInterrupted => {
            ErrorKind::Cancelled
        }
        _ => ErrorKind::Infrastructure,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
    }

    #[test]
    fn step_display_names_the_step() {
        let err = StoreError::step(
            "writing audit log entry",
            "INSERT INTO audit_log ...",
            rusqlite::Error::QueryReturnedNoRows,
        );
        assert!(err.to_string().starts_with("writing audit log entry: "));
    }

    #[test]
    fn kind_looks_through_steps() {
        let err = StoreError::step("creating entity", "UPDATE items ...", StoreError::NoRowsModified);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn input_errors_are_not_retryable() {
        let err = StoreError::InvalidIdentifier("item_id");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "invalid identifier: item_id must be between 1 and i64::MAX");
    }

    #[test]
    fn data_integrity_is_never_retryable() {
        let err = StoreError::DataIntegrity {
            column: "reputation",
            value: "suspicious".into(),
            reason: "unknown user reputation".into(),
        };
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert!(!err.is_retryable());
    }

    #[test]
    fn busy_database_is_retryable() {
        let err = StoreError::Sqlite(sqlite_failure(rusqlite::ffi::SQLITE_BUSY));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert!(err.is_retryable());
    }

    #[test]
    fn interrupted_statement_is_cancellation() {
        let err = StoreError::Sqlite(sqlite_failure(rusqlite::ffi::SQLITE_INTERRUPT));
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn unready_is_retryable_infrastructure() {
        assert_eq!(StoreError::Unready.kind(), ErrorKind::Infrastructure);
        assert!(StoreError::Unready.is_retryable());
    }

    #[test]
    fn no_rows_from_driver_is_not_found() {
        let err = StoreError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.is_not_found());
    }
}
