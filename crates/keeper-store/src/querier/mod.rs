//! The querier: per-entity operations over one pool and one query builder.
//!
//! Every public operation is `async`, takes a [`CancellationToken`] first,
//! validates identifiers before touching the database, and runs its blocking
//! work on the blocking pool. Reads go straight to a pooled connection;
//! writes go through the [`WriteExecutor`] so each one lands atomically with
//! its audit entry.

mod accounts;
mod audit_log_entries;
pub mod executor;
pub mod id_strategy;
mod items;
mod oauth2_clients;
pub mod readiness;
pub mod row_mapper;
pub mod stream;
mod users;
mod webhooks;

use std::sync::Arc;

use keeper_core::ids::is_absent;
use keeper_core::{Pagination, QueryFilter, TestUserCreationConfig};
use keeper_settings::{DatabaseSettings, Provider};
use rusqlite::Connection;
use tokio::sync::{OnceCell, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::{Result, StoreError};
use crate::migrations::run_migrations;
use crate::querybuilding::{self, Query, QueryBuilder};
use crate::sqlite::{self, ConnectionPool};

pub use executor::{TransactionWrites, WriteExecutor};
pub use id_strategy::IdRetrievalStrategy;
pub use readiness::{ConnectivityProbe, PING_INTERVAL, wait_until_ready};
pub use row_mapper::{MapRow, Scanned, ScannedList};
pub use stream::{BatchWindow, Delivery, StreamOptions, WindowFailure, batch_windows, stream_all};

use row_mapper::scan_list;

/// Builds a batch query for ids in `[begin, end)`.
type BatchQuery = fn(&dyn QueryBuilder, u64, u64) -> Query;

/// Data-access engine for every entity type.
pub struct Querier {
    pool: ConnectionPool,
    builder: Arc<dyn QueryBuilder>,
    provider: Provider,
    executor: WriteExecutor,
    stream_options: StreamOptions,
    migrated: OnceCell<()>,
}

impl std::fmt::Debug for Querier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Querier")
            .field("backend", &self.builder.name())
            .field("provider", &self.provider)
            .field("strategy", &self.executor.strategy())
            .field("stream_options", &self.stream_options)
            .field("migrated", &self.migrated.initialized())
            .finish_non_exhaustive()
    }
}

impl Querier {
    /// Querier whose identifier strategy follows `provider`.
    ///
    /// Fails when `builder` does not generate inserts that strategy can read
    /// a key back from.
    pub fn new(pool: ConnectionPool, builder: Arc<dyn QueryBuilder>, provider: Provider) -> Result<Self> {
        Self::with_strategy(pool, builder, provider, IdRetrievalStrategy::for_provider(provider))
    }

    /// Querier with an explicit identifier strategy.
    ///
    /// `ReturningColumn` needs a builder whose inserts end in a returning
    /// suffix and `LastInsertId` needs one whose inserts do not.
    pub fn with_strategy(
        pool: ConnectionPool,
        builder: Arc<dyn QueryBuilder>,
        provider: Provider,
        strategy: IdRetrievalStrategy,
    ) -> Result<Self> {
        if IdRetrievalStrategy::for_dialect(builder.as_ref()) != strategy {
            return Err(StoreError::InvalidInput(format!(
                "{strategy:?} cannot read keys from {} inserts",
                builder.name()
            )));
        }
        debug!(backend = builder.name(), ?strategy, "querier constructed");
        Ok(Self {
            executor: WriteExecutor::new(strategy, Arc::clone(&builder)),
            pool,
            builder,
            provider,
            stream_options: StreamOptions::default(),
            migrated: OnceCell::new(),
        })
    }

    /// Override window width and concurrency for full-table streams.
    #[must_use]
    pub fn with_stream_options(mut self, options: StreamOptions) -> Self {
        self.stream_options = options;
        self
    }

    /// Open a pool for `settings`, build the querier, and migrate when
    /// `run_migrations` is set.
    pub async fn from_settings(cancel: &CancellationToken, settings: &DatabaseSettings) -> Result<Self> {
        settings
            .validate()
            .map_err(|e| StoreError::InvalidInput(e.to_string()))?;
        let pool = sqlite::open(settings)?;
        let querier = Self::new(pool, querybuilding::for_provider(settings.provider), settings.provider)?
            .with_stream_options(StreamOptions {
                batch_size: settings.stream_batch_size,
                concurrency: settings.stream_concurrency,
            });
        if settings.run_migrations {
            querier
                .migrate(cancel, settings.max_ping_attempts, settings.create_test_user.as_ref())
                .await?;
        }
        Ok(querier)
    }

    /// Configured backend.
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Active identifier strategy.
    pub fn strategy(&self) -> IdRetrievalStrategy {
        self.executor.strategy()
    }

    /// Probe the database up to `max_attempts` times, one second apart.
    pub async fn is_ready(&self, cancel: &CancellationToken, max_attempts: u32) -> bool {
        wait_until_ready(cancel, &self.pool, max_attempts, PING_INTERVAL).await
    }

    /// Wait for the database, bring the schema up to date, and optionally
    /// seed a test user.
    ///
    /// The schema step runs at most once per querier even under concurrent
    /// callers; a failed run is retried by the next call.
    pub async fn migrate(
        &self,
        cancel: &CancellationToken,
        max_attempts: u32,
        test_user: Option<&TestUserCreationConfig>,
    ) -> Result<()> {
        info!(backend = self.builder.name(), "migrating database");
        if !self.is_ready(cancel, max_attempts).await {
            return Err(StoreError::Unready);
        }

        self.migrated
            .get_or_try_init(|| async {
                let migrations = self.builder.migrations();
                let applied = self.run(cancel, move |conn, _, _| run_migrations(conn, migrations)).await?;
                info!(applied, "schema migrated");
                Ok::<(), StoreError>(())
            })
            .await?;

        if let Some(config) = test_user {
            self.ensure_test_user(cancel, config).await?;
        }
        Ok(())
    }

    /// Run `work` on a pooled connection off the async runtime.
    ///
    /// Cancelling `cancel` interrupts the running statement. If the work then
    /// fails, the caller sees [`StoreError::Cancelled`]; work that finished
    /// before the interrupt landed reports its real outcome.
    async fn run<T, F>(&self, cancel: &CancellationToken, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &dyn QueryBuilder, &WriteExecutor) -> Result<T> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let pool = self.pool.clone();
        let builder = Arc::clone(&self.builder);
        let executor = self.executor.clone();
        let token = cancel.clone();
        let (handle_tx, mut handle_rx) = oneshot::channel();

        let mut task = tokio::task::spawn_blocking(move || -> Result<T> {
            let conn = pool.get()?;
            let _ = handle_tx.send(conn.get_interrupt_handle());
            if token.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            work(&conn, builder.as_ref(), &executor)
        });

        tokio::select! {
            joined = &mut task => flatten(joined),
            () = cancel.cancelled() => {
                if let Ok(handle) = handle_rx.try_recv() {
                    handle.interrupt();
                }
                match flatten(task.await) {
                    Ok(value) => {
                        debug!("operation completed before cancellation took effect");
                        Ok(value)
                    }
                    Err(e) => {
                        debug!(error = %e, "operation cancelled");
                        Err(StoreError::Cancelled)
                    }
                }
            }
        }
    }

    /// Count `total` rows, then stream them in windows through `map`.
    fn stream<T>(
        &self,
        cancel: &CancellationToken,
        total: u64,
        delivery: Delivery<T>,
        batch_query: BatchQuery,
        map: MapRow<T>,
    ) -> Result<()>
    where
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        let builder = Arc::clone(&self.builder);
        stream_all(cancel, total, self.stream_options, delivery, move |window| {
            let conn = pool.get()?;
            let query = batch_query(builder.as_ref(), window.begin, window.end);
            Ok(scan_list(&conn, &query, map, false)?.entities)
        })
    }
}

fn flatten<T>(joined: std::result::Result<Result<T>, tokio::task::JoinError>) -> Result<T> {
    joined.map_err(|e| StoreError::Internal(format!("blocking task failed: {e}")))?
}

/// Reject the absent sentinel, and keys no row can have, for a required
/// identifier.
fn require(id: u64, name: &'static str) -> Result<()> {
    if is_absent(id) || i64::try_from(id).is_err() {
        Err(StoreError::InvalidIdentifier(name))
    } else {
        Ok(())
    }
}

/// Reject an empty required string.
fn require_text(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(StoreError::InvalidInput(format!("{name} is required")))
    } else {
        Ok(())
    }
}

/// Pagination block for a list read.
fn pagination(filter: Option<&QueryFilter>, filtered_count: u64, total_count: u64) -> Pagination {
    Pagination {
        filtered_count,
        total_count,
        ..Pagination::for_filter(filter)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::querybuilding::{Postgres, Sqlite};
    use crate::sqlite::{ConnectionConfig, new_in_memory};

    fn querier() -> Querier {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        Querier::new(pool, Arc::new(Sqlite::new()), Provider::Sqlite).unwrap()
    }

    #[test]
    fn strategy_follows_provider() {
        assert_eq!(querier().strategy(), IdRetrievalStrategy::LastInsertId);
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        let q = Querier::new(pool, Arc::new(Postgres), Provider::Postgres).unwrap();
        assert_eq!(q.strategy(), IdRetrievalStrategy::ReturningColumn);
    }

    #[test]
    fn builder_must_fit_the_strategy() {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        let err = Querier::new(pool.clone(), Arc::new(Sqlite::new()), Provider::Postgres).unwrap_err();
        assert_matches!(err, StoreError::InvalidInput(msg) if msg.contains("sqlite"));

        let err = Querier::with_strategy(
            pool.clone(),
            Arc::new(Sqlite::with_returning()),
            Provider::Sqlite,
            IdRetrievalStrategy::LastInsertId,
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::InvalidInput);

        let q = Querier::with_strategy(
            pool,
            Arc::new(Sqlite::with_returning()),
            Provider::Sqlite,
            IdRetrievalStrategy::ReturningColumn,
        )
        .unwrap();
        assert_eq!(q.strategy(), IdRetrievalStrategy::ReturningColumn);
    }

    #[test]
    fn identifiers_must_fit_a_stored_key() {
        assert_matches!(require(0, "item_id"), Err(StoreError::InvalidIdentifier("item_id")));
        assert!(require(1, "item_id").is_ok());
        assert!(require(i64::MAX.unsigned_abs(), "item_id").is_ok());
        assert_matches!(require(u64::MAX, "item_id"), Err(StoreError::InvalidIdentifier("item_id")));
    }

    #[test]
    fn blank_text_is_invalid_input() {
        assert_matches!(require_text("  ", "name"), Err(StoreError::InvalidInput(_)));
    }

    #[test]
    fn pagination_echoes_filter() {
        let p = pagination(None, 4, 9);
        assert_eq!((p.page, p.limit, p.filtered_count, p.total_count), (0, 0, 4, 9));
        let f = QueryFilter::new(2, 10);
        let p = pagination(Some(&f), 1, 1);
        assert_eq!((p.page, p.limit), (2, 10));
    }

    #[tokio::test]
    async fn migrate_runs_once() {
        let q = querier();
        let cancel = CancellationToken::new();
        q.migrate(&cancel, 1, None).await.unwrap();
        q.migrate(&cancel, 1, None).await.unwrap();
        let version = q
            .run(&cancel, |conn, _, _| crate::migrations::current_version(conn))
            .await
            .unwrap();
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn migrate_without_readiness_is_unready() {
        let q = querier();
        let cancel = CancellationToken::new();
        assert_matches!(q.migrate(&cancel, 0, None).await, Err(StoreError::Unready));
        assert!(!q.migrated.initialized());
    }

    #[tokio::test]
    async fn concurrent_first_migrations_share_one_run() {
        let q = Arc::new(querier());
        let cancel = CancellationToken::new();
        let (a, b) = tokio::join!(q.migrate(&cancel, 1, None), q.migrate(&cancel, 1, None));
        a.unwrap();
        b.unwrap();
        assert!(q.migrated.initialized());
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let q = querier();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = q.run(&cancel, |_, _, _| Ok(1)).await;
        assert_matches!(result, Err(StoreError::Cancelled));
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_running_statement() {
        let q = querier();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let (started_tx, started_rx) = oneshot::channel::<()>();

        let pending = q.run(&cancel, move |conn, _, _| {
            let _ = started_tx.send(());
            // Unbounded recursive CTE: only an interrupt stops it.
            let n: i64 = conn.query_row(
                "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT max(x) FROM c",
                [],
                |row| row.get(0),
            )?;
            Ok(n)
        });
        let canceller = async move {
            let _ = started_rx.await;
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        };
        let (result, ()) = tokio::join!(pending, canceller);
        assert_matches!(result, Err(StoreError::Cancelled));
    }
}
