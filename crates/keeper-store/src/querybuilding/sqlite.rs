//! `SQLite` statements: numbered `?N` placeholders and `json_extract`.

use super::{Dialect, QueryBuilder};
use crate::migrations::{self, Migration};

/// Builder for `SQLite`.
///
/// Inserts normally rely on the driver's last-insert rowid. `SQLite` 3.35+
/// also understands `RETURNING`, which [`Sqlite::with_returning`] turns on
/// for use with the scan-returned-id strategy.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sqlite {
    returning: bool,
}

impl Sqlite {
    /// Plain inserts.
    pub const fn new() -> Self {
        Self { returning: false }
    }

    /// Inserts end in `RETURNING id`.
    pub const fn with_returning() -> Self {
        Self { returning: true }
    }
}

impl Dialect for Sqlite {
    fn placeholder(&self, position: usize) -> String {
        format!("?{position}")
    }

    fn current_unix_time(&self) -> &'static str {
        "(CAST(strftime('%s', 'now') AS INTEGER))"
    }

    fn json_pluck(&self, column: &str, key: &str) -> String {
        format!("json_extract({column}, '$.{key}')")
    }

    fn returning_id(&self) -> &'static str {
        if self.returning { " RETURNING id" } else { "" }
    }
}

impl QueryBuilder for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn migrations(&self) -> &'static [Migration] {
        migrations::SQLITE
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use keeper_core::Item;
    use rusqlite::Connection;

    use super::*;

    fn migrated() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let _ = crate::migrations::run_migrations(&conn, migrations::SQLITE).unwrap();
        conn
    }

    #[test]
    fn generated_statements_prepare_against_the_schema() {
        let conn = migrated();
        let b = Sqlite::new();
        let item = Item {
            id: 1,
            belongs_to_account: 1,
            ..Item::default()
        };
        for q in [
            b.build_get_item_query(1, 1),
            b.build_item_exists_query(1, 1),
            b.build_get_all_items_count_query(),
            b.build_get_batch_of_items_query(1, 1001),
            b.build_get_items_query(1, None),
            b.build_create_item_query(&item),
            b.build_update_item_query(&item),
            b.build_archive_item_query(1, 1),
            b.build_get_audit_log_entries_for_item_query(1),
            b.build_get_users_query(None),
            b.build_get_user_by_username_query("u"),
            b.build_get_oauth2_client_by_client_id_query("c"),
            b.build_get_accounts_query(1, None),
            b.build_get_webhooks_query(1, None),
            b.build_get_audit_log_entries_query(None),
        ] {
            let stmt = conn.prepare(&q.sql).unwrap();
            assert_eq!(stmt.parameter_count(), q.args.len(), "{}", q.sql);
        }
    }

    #[test]
    fn returning_is_opt_in() {
        let item = Item::default();
        assert!(!Sqlite::new().build_create_item_query(&item).sql.contains("RETURNING"));
        assert!(
            Sqlite::with_returning()
                .build_create_item_query(&item)
                .sql
                .ends_with("RETURNING id")
        );
    }
}
