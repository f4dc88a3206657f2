//! Transactional writes.
//!
//! Every mutation runs in a transaction together with the audit entry that
//! describes it. Steps run strictly in order:
//!
//! 1. `beginning transaction`
//! 2. the mutation, named by the caller (e.g. `creating item`)
//! 3. `writing audit log entry`, when an entry is supplied
//! 4. `committing transaction`
//!
//! Steps 2 and 3 may repeat inside one [`WriteExecutor::transaction`] when a
//! logical operation touches several rows. The first failing step is rolled
//! back and returned wrapped in [`StoreError::Step`]. Nothing is retried here.

use std::sync::Arc;

use keeper_core::ids::{new_external_id, unix_now};
use keeper_core::{AuditLogEntry, AuditLogEntryCreationInput};
use rusqlite::{Connection, Transaction};
use tracing::{debug, error};

use super::id_strategy::{IdRetrievalStrategy, execute, execute_targeted};
use crate::errors::{Result, StoreError};
use crate::querybuilding::{Query, QueryBuilder};

const BEGIN_STEP: &str = "beginning transaction";
const AUDIT_STEP: &str = "writing audit log entry";
const COMMIT_STEP: &str = "committing transaction";

/// Runs mutations atomically with their audit entries.
#[derive(Clone, Debug)]
pub struct WriteExecutor {
    strategy: IdRetrievalStrategy,
    builder: Arc<dyn QueryBuilder>,
}

/// Mutations issued inside an open transaction.
#[derive(Debug)]
pub struct TransactionWrites<'a> {
    executor: &'a WriteExecutor,
    conn: &'a Connection,
}

impl WriteExecutor {
    /// Executor reading keys with `strategy` and building audit inserts with `builder`.
    pub fn new(strategy: IdRetrievalStrategy, builder: Arc<dyn QueryBuilder>) -> Self {
        Self { strategy, builder }
    }

    /// Active identifier strategy.
    pub fn strategy(&self) -> IdRetrievalStrategy {
        self.strategy
    }

    /// Run one mutation in a transaction without an audit entry.
    ///
    /// With `ignore_returned_id` the statement is a targeted update: zero
    /// affected rows is [`StoreError::NoRowsModified`] and the result is 0.
    /// Otherwise it is an insert and the result is the generated key.
    pub fn perform_write(
        &self,
        conn: &Connection,
        description: &'static str,
        query: &Query,
        ignore_returned_id: bool,
    ) -> Result<u64> {
        self.perform_write_then_audit(conn, description, query, ignore_returned_id, |_| None)
    }

    /// Run one mutation and its audit entry in a single transaction.
    ///
    /// `audit` receives the key the mutation produced (0 for targeted
    /// updates) so creation entries can reference the new row.
    pub fn perform_write_then_audit<F>(
        &self,
        conn: &Connection,
        description: &'static str,
        query: &Query,
        ignore_returned_id: bool,
        audit: F,
    ) -> Result<u64>
    where
        F: FnOnce(u64) -> Option<AuditLogEntryCreationInput>,
    {
        let id = self.transaction(conn, |writes| {
            writes.write_then_audit(description, query, ignore_returned_id, audit)
        })?;
        debug!(step = description, id, "write committed");
        Ok(id)
    }

    /// Run `work` in one transaction: commit if it succeeds, roll back and
    /// return its error otherwise.
    pub fn transaction<T, F>(&self, conn: &Connection, work: F) -> Result<T>
    where
        F: FnOnce(&TransactionWrites<'_>) -> Result<T>,
    {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StoreError::step(BEGIN_STEP, "BEGIN", e))?;

        let outcome = work(&TransactionWrites {
            executor: self,
            conn: &tx,
        });
        match outcome {
            Ok(value) => {
                tx.commit().map_err(|e| StoreError::step(COMMIT_STEP, "COMMIT", e))?;
                Ok(value)
            }
            Err(e) => Err(rollback(tx, e)),
        }
    }

    fn mutate(&self, conn: &Connection, query: &Query, ignore_returned_id: bool) -> Result<u64> {
        if ignore_returned_id {
            execute_targeted(conn, query)?;
            Ok(0)
        } else {
            self.strategy.insert(conn, query)
        }
    }
}

impl TransactionWrites<'_> {
    /// Run one mutation, then the audit entry `audit` builds from its key.
    /// Nothing is committed until the enclosing transaction finishes.
    pub fn write_then_audit<F>(
        &self,
        description: &'static str,
        query: &Query,
        ignore_returned_id: bool,
        audit: F,
    ) -> Result<u64>
    where
        F: FnOnce(u64) -> Option<AuditLogEntryCreationInput>,
    {
        let id = self
            .executor
            .mutate(self.conn, query, ignore_returned_id)
            .map_err(|e| StoreError::step(description, &query.sql, e))?;

        if let Some(input) = audit(id) {
            let entry_query = self
                .executor
                .builder
                .build_create_audit_log_entry_query(&audit_entry(input));
            execute(self.conn, &entry_query).map_err(|e| StoreError::step(AUDIT_STEP, entry_query.sql.clone(), e))?;
        }
        Ok(id)
    }
}

fn audit_entry(input: AuditLogEntryCreationInput) -> AuditLogEntry {
    AuditLogEntry {
        id: 0,
        external_id: new_external_id(),
        event_type: input.event_type,
        context: input.context,
        created_on: unix_now(),
    }
}

/// Roll back and hand back `cause`; a failed rollback is logged only.
fn rollback(tx: Transaction<'_>, cause: StoreError) -> StoreError {
    if let Err(e) = tx.rollback() {
        error!(error = %e, cause = %cause, "rolling back transaction failed");
    }
    cause
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
