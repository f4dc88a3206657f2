//! # keeper-store
//!
//! Transactional, multi-dialect data access for the keeper service.
//!
//! - **Querier**: per-entity fetch, list, create, update, archive and audit
//!   history operations, plus full-table streaming and startup sequencing
//! - **Query builders**: one type per backend (`SQLite`, Postgres, `MariaDB`)
//!   producing statement text and positional arguments
//! - **Write executor**: every mutation commits atomically with its audit entry
//! - **Identifier strategy**: last-insert-id or `RETURNING id`, fixed per querier
//! - **Streaming fetcher**: concurrent id-window batches over a channel
//! - **Readiness gate**: bounded connectivity probe before migrations
//!
//! ## Crate Position
//!
//! Engine layer. Depends on: keeper-core, keeper-settings.

#![deny(unsafe_code)]

pub mod errors;
pub mod migrations;
pub mod querier;
pub mod querybuilding;
pub mod sqlite;

pub use errors::{ErrorKind, Result, StoreError};
pub use querier::{
    BatchWindow, ConnectivityProbe, Delivery, IdRetrievalStrategy, Querier, StreamOptions, TransactionWrites,
    WindowFailure, WriteExecutor,
};
pub use querybuilding::{Dialect, MariaDb, Postgres, Query, QueryBuilder, Sqlite, for_provider};
pub use sqlite::{ConnectionConfig, ConnectionPool};
