//! MariaDB statements: bare `?` placeholders, `JSON_EXTRACT`, and no
//! `RETURNING` on inserts, so generated keys come from the driver.

use super::{Dialect, QueryBuilder};
use crate::migrations::{self, Migration};

/// Builder for MariaDB / MySQL.
#[derive(Clone, Copy, Debug, Default)]
pub struct MariaDb;

impl Dialect for MariaDb {
    fn placeholder(&self, _position: usize) -> String {
        "?".to_owned()
    }

    fn current_unix_time(&self) -> &'static str {
        "UNIX_TIMESTAMP()"
    }

    fn json_pluck(&self, column: &str, key: &str) -> String {
        format!("JSON_EXTRACT({column}, '$.{key}')")
    }
}

impl QueryBuilder for MariaDb {
    fn name(&self) -> &'static str {
        "mariadb"
    }

    fn migrations(&self) -> &'static [Migration] {
        migrations::MARIADB
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use keeper_core::Item;

    use super::*;

    #[test]
    fn placeholders_are_bare() {
        let q = MariaDb.build_get_item_query(1, 2);
        assert!(q.sql.ends_with("items.belongs_to_account = ? AND items.id = ?"));
        assert_eq!(q.sql.matches('?').count(), q.args.len());
    }

    #[test]
    fn inserts_never_return() {
        let q = MariaDb.build_create_item_query(&Item::default());
        assert!(q.sql.ends_with("VALUES (?, ?, ?, ?, ?)"));
    }

    #[test]
    fn update_stamps_with_unix_timestamp() {
        let q = MariaDb.build_update_item_query(&Item::default());
        assert!(q.sql.contains("last_updated_on = UNIX_TIMESTAMP()"));
    }
}
