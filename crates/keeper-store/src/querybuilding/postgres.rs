//! PostgreSQL statements: `$N` placeholders, `->>` JSON access, and inserts
//! that return their generated key.

use super::{Dialect, QueryBuilder};
use crate::migrations::{self, Migration};

/// Builder for PostgreSQL.
#[derive(Clone, Copy, Debug, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn placeholder(&self, position: usize) -> String {
        format!("${position}")
    }

    fn current_unix_time(&self) -> &'static str {
        "extract(epoch FROM NOW())"
    }

    fn json_pluck(&self, column: &str, key: &str) -> String {
        format!("({column}->>'{key}')::bigint")
    }

    fn returning_id(&self) -> &'static str {
        " RETURNING id"
    }
}

impl QueryBuilder for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn migrations(&self) -> &'static [Migration] {
        migrations::POSTGRES
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
