//! Statement shapes shared by every backend.
//!
//! Builders here only decide structure; placeholders, timestamps and JSON
//! access come from the [`Dialect`] they are handed. Arguments are bound in
//! the order their placeholders appear in the text, so `?`-style backends
//! work as well as numbered ones.

use keeper_core::QueryFilter;
use rusqlite::types::Value;

use super::{Dialect, Query};

/// A table the querier reads and writes.
#[derive(Debug)]
pub struct Table {
    /// Table name.
    pub name: &'static str,
    /// Selected columns, in the order the row mapper reads them.
    pub columns: &'static [&'static str],
    /// Column scoping rows to a tenant or user, if any.
    pub owner: Option<&'static str>,
    /// Whether rows carry `archived_on` and are hidden once it is set.
    pub archivable: bool,
}

/// `items`.
pub const ITEMS: Table = Table {
    name: "items",
    columns: &[
        "id",
        "external_id",
        "name",
        "details",
        "created_on",
        "last_updated_on",
        "archived_on",
        "belongs_to_account",
    ],
    owner: Some("belongs_to_account"),
    archivable: true,
};

/// `webhooks`.
pub const WEBHOOKS: Table = Table {
    name: "webhooks",
    columns: &[
        "id",
        "external_id",
        "name",
        "content_type",
        "url",
        "method",
        "events",
        "data_types",
        "topics",
        "created_on",
        "last_updated_on",
        "archived_on",
        "belongs_to_account",
    ],
    owner: Some("belongs_to_account"),
    archivable: true,
};

/// `oauth2_clients`.
pub const OAUTH2_CLIENTS: Table = Table {
    name: "oauth2_clients",
    columns: &[
        "id",
        "external_id",
        "name",
        "client_id",
        "client_secret",
        "redirect_uri",
        "scopes",
        "created_on",
        "last_updated_on",
        "archived_on",
        "belongs_to_user",
    ],
    owner: Some("belongs_to_user"),
    archivable: true,
};

/// `users`. Not owned by anything.
pub const USERS: Table = Table {
    name: "users",
    columns: &[
        "id",
        "external_id",
        "username",
        "avatar_src",
        "hashed_password",
        "requires_password_change",
        "password_last_changed_on",
        "two_factor_secret",
        "two_factor_secret_verified_on",
        "service_roles",
        "reputation",
        "reputation_explanation",
        "created_on",
        "last_updated_on",
        "archived_on",
    ],
    owner: None,
    archivable: true,
};

/// `accounts`.
pub const ACCOUNTS: Table = Table {
    name: "accounts",
    columns: &[
        "id",
        "external_id",
        "name",
        "created_on",
        "last_updated_on",
        "archived_on",
        "belongs_to_user",
    ],
    owner: Some("belongs_to_user"),
    archivable: true,
};

/// `audit_log`. Append-only, never archived.
pub const AUDIT_LOG: Table = Table {
    name: "audit_log",
    columns: &["id", "external_id", "event_type", "context", "created_on"],
    owner: None,
    archivable: false,
};

/// Convert a surrogate key or timestamp into a bindable value.
///
/// Values above `i64::MAX` saturate. No stored key or timestamp is that
/// large, so a saturated key matches nothing and a saturated upper bound
/// excludes nothing. Callers reject such keys before building a query.
pub fn int(value: u64) -> Value {
    Value::Integer(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Optional timestamp.
pub fn opt_int(value: Option<u64>) -> Value {
    value.map_or(Value::Null, int)
}

/// Accumulates arguments while statement text is assembled.
pub struct Binder<'d, D: Dialect + ?Sized> {
    dialect: &'d D,
    args: Vec<Value>,
}

impl<'d, D: Dialect + ?Sized> Binder<'d, D> {
    /// Start with no arguments.
    pub fn new(dialect: &'d D) -> Self {
        Self {
            dialect,
            args: Vec::new(),
        }
    }

    /// Record `value` and return the placeholder that refers to it.
    pub fn bind(&mut self, value: impl Into<Value>) -> String {
        self.args.push(value.into());
        self.dialect.placeholder(self.args.len())
    }

    /// Pair `sql` with the bound arguments.
    pub fn finish(self, sql: String) -> Query {
        Query { sql, args: self.args }
    }
}

fn select_list(t: &Table) -> String {
    t.columns
        .iter()
        .map(|c| format!("{}.{c}", t.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn scope<D: Dialect + ?Sized>(
    b: &mut Binder<'_, D>,
    t: &Table,
    owner: Option<u64>,
    include_archived: bool,
) -> Vec<String> {
    let mut conditions = Vec::new();
    if t.archivable && !include_archived {
        conditions.push(format!("{}.archived_on IS NULL", t.name));
    }
    if let (Some(column), Some(owner)) = (t.owner, owner) {
        conditions.push(format!("{}.{column} = {}", t.name, b.bind(int(owner))));
    }
    conditions
}

fn filter_conditions<D: Dialect + ?Sized>(b: &mut Binder<'_, D>, t: &Table, filter: &QueryFilter) -> Vec<String> {
    let bounds = [
        ("created_on", ">", filter.created_after),
        ("created_on", "<", filter.created_before),
        ("last_updated_on", ">", filter.updated_after),
        ("last_updated_on", "<", filter.updated_before),
    ];
    let mut conditions = Vec::new();
    for (column, op, bound) in bounds {
        // audit_log has no last_updated_on
        if column == "last_updated_on" && !t.archivable {
            continue;
        }
        if let Some(value) = bound {
            conditions.push(format!("{}.{column} {op} {}", t.name, b.bind(int(value))));
        }
    }
    conditions
}

fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

/// One live row by surrogate key, optionally scoped to an owner.
pub fn get_by_id<D: Dialect + ?Sized>(d: &D, t: &Table, id: u64, owner: Option<u64>) -> Query {
    let mut b = Binder::new(d);
    let mut conditions = scope(&mut b, t, owner, false);
    conditions.push(format!("{}.id = {}", t.name, b.bind(int(id))));
    let sql = format!("SELECT {} FROM {}{}", select_list(t), t.name, where_clause(&conditions));
    b.finish(sql)
}

/// One live row by an arbitrary unique column.
pub fn get_by_column<D: Dialect + ?Sized>(d: &D, t: &Table, column: &str, value: Value) -> Query {
    let mut b = Binder::new(d);
    let mut conditions = scope(&mut b, t, None, false);
    conditions.push(format!("{}.{column} = {}", t.name, b.bind(value)));
    let sql = format!("SELECT {} FROM {}{}", select_list(t), t.name, where_clause(&conditions));
    b.finish(sql)
}

/// Whether a live row exists.
pub fn exists<D: Dialect + ?Sized>(d: &D, t: &Table, id: u64, owner: Option<u64>) -> Query {
    let mut b = Binder::new(d);
    let mut conditions = scope(&mut b, t, owner, false);
    conditions.push(format!("{}.id = {}", t.name, b.bind(int(id))));
    let sql = format!(
        "SELECT EXISTS (SELECT {0}.id FROM {0}{1})",
        t.name,
        where_clause(&conditions)
    );
    b.finish(sql)
}

/// Whether any row, archived or not, holds `value` in `column`.
pub fn value_taken<D: Dialect + ?Sized>(d: &D, t: &Table, column: &str, value: Value) -> Query {
    let mut b = Binder::new(d);
    let condition = format!("{}.{column} = {}", t.name, b.bind(value));
    let sql = format!("SELECT EXISTS (SELECT {0}.id FROM {0} WHERE {1})", t.name, condition);
    b.finish(sql)
}

/// Number of live rows in the whole table.
pub fn count_all<D: Dialect + ?Sized>(d: &D, t: &Table) -> Query {
    let mut b = Binder::new(d);
    let conditions = scope(&mut b, t, None, false);
    let sql = format!("SELECT COUNT({0}.id) FROM {0}{1}", t.name, where_clause(&conditions));
    b.finish(sql)
}

/// Live rows with `begin <= id < end`.
pub fn batch<D: Dialect + ?Sized>(d: &D, t: &Table, begin: u64, end: u64) -> Query {
    let mut b = Binder::new(d);
    let mut conditions = scope(&mut b, t, None, false);
    conditions.push(format!("{}.id >= {}", t.name, b.bind(int(begin))));
    conditions.push(format!("{}.id < {}", t.name, b.bind(int(end))));
    let sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}.id ASC",
        select_list(t),
        t.name,
        where_clause(&conditions),
        t.name
    );
    b.finish(sql)
}

/// One page of rows with trailing `filtered_count` and `total_count` columns.
///
/// An absent filter pages with the defaults.
pub fn list<D: Dialect + ?Sized>(d: &D, t: &Table, owner: Option<u64>, filter: Option<&QueryFilter>) -> Query {
    let defaults = QueryFilter::default();
    let filter = filter.unwrap_or(&defaults);
    let mut b = Binder::new(d);

    let mut filtered = scope(&mut b, t, owner, filter.include_archived);
    filtered.extend(filter_conditions(&mut b, t, filter));
    let filtered_count = format!("(SELECT COUNT({0}.id) FROM {0}{1}) AS filtered_count", t.name, where_clause(&filtered));

    let total = scope(&mut b, t, owner, false);
    let total_count = format!("(SELECT COUNT({0}.id) FROM {0}{1}) AS total_count", t.name, where_clause(&total));

    let mut main = scope(&mut b, t, owner, filter.include_archived);
    main.extend(filter_conditions(&mut b, t, filter));

    let sql = format!(
        "SELECT {}, {filtered_count}, {total_count} FROM {}{} ORDER BY {}.id {} LIMIT {} OFFSET {}",
        select_list(t),
        t.name,
        where_clause(&main),
        t.name,
        filter.sort_by.as_sql(),
        filter.effective_limit(),
        filter.offset(),
    );
    b.finish(sql)
}

/// Insert one row. `returning` appends the dialect's generated-key clause.
pub fn insert<D: Dialect + ?Sized>(d: &D, t: &Table, values: Vec<(&str, Value)>, returning: bool) -> Query {
    let mut b = Binder::new(d);
    let (columns, placeholders): (Vec<&str>, Vec<String>) =
        values.into_iter().map(|(column, value)| (column, b.bind(value))).unzip();
    let suffix = if returning { d.returning_id() } else { "" };
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}){suffix}",
        t.name,
        columns.join(", "),
        placeholders.join(", ")
    );
    b.finish(sql)
}

/// Overwrite columns of one live row and stamp `last_updated_on`.
pub fn update<D: Dialect + ?Sized>(
    d: &D,
    t: &Table,
    assignments: Vec<(&str, Value)>,
    id: u64,
    owner: Option<u64>,
) -> Query {
    let mut b = Binder::new(d);
    let mut sets: Vec<String> = assignments
        .into_iter()
        .map(|(column, value)| format!("{column} = {}", b.bind(value)))
        .collect();
    sets.push(format!("last_updated_on = {}", d.current_unix_time()));

    let mut conditions = scope(&mut b, t, owner, false);
    conditions.push(format!("{}.id = {}", t.name, b.bind(int(id))));
    let sql = format!("UPDATE {} SET {}{}", t.name, sets.join(", "), where_clause(&conditions));
    b.finish(sql)
}

/// Mark one live row archived. Already-archived rows are not matched.
pub fn archive<D: Dialect + ?Sized>(d: &D, t: &Table, id: u64, owner: Option<u64>) -> Query {
    let mut b = Binder::new(d);
    let now = d.current_unix_time();
    let mut conditions = scope(&mut b, t, owner, false);
    conditions.push(format!("{}.id = {}", t.name, b.bind(int(id))));
    let sql = format!(
        "UPDATE {} SET last_updated_on = {now}, archived_on = {now}{}",
        t.name,
        where_clause(&conditions)
    );
    b.finish(sql)
}

/// Audit entries whose context `key` equals `id`, oldest first.
pub fn audit_entries_for<D: Dialect + ?Sized>(d: &D, key: &str, id: u64) -> Query {
    let mut b = Binder::new(d);
    let t = &AUDIT_LOG;
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = {} ORDER BY {}.created_on ASC, {}.id ASC",
        select_list(t),
        t.name,
        d.json_pluck(&format!("{}.context", t.name), key),
        b.bind(int(id)),
        t.name,
        t.name,
    );
    b.finish(sql)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Numbered;

    impl Dialect for Numbered {
        fn placeholder(&self, position: usize) -> String {
            format!("?{position}")
        }

        fn current_unix_time(&self) -> &'static str {
            "NOW"
        }

        fn json_pluck(&self, column: &str, key: &str) -> String {
            format!("pluck({column}, {key})")
        }

        fn returning_id(&self) -> &'static str {
            " RETURNING id"
        }
    }

    #[test]
    fn value_taken_ignores_archive_state() {
        let q = value_taken(&Numbered, &USERS, "username", Value::Text("ada".into()));
        assert_eq!(q.sql, "SELECT EXISTS (SELECT users.id FROM users WHERE users.username = ?1)");
        assert_eq!(q.args, vec![Value::Text("ada".into())]);
    }

    #[test]
    fn get_by_id_scopes_to_owner() {
        let q = get_by_id(&Numbered, &ITEMS, 5, Some(9));
        assert!(q.sql.ends_with(
            "FROM items WHERE items.archived_on IS NULL AND items.belongs_to_account = ?1 AND items.id = ?2"
        ));
        assert_eq!(q.args, vec![Value::Integer(9), Value::Integer(5)]);
    }

    #[test]
    fn audit_log_is_never_filtered_on_archive() {
        let q = get_by_id(&Numbered, &AUDIT_LOG, 1, None);
        assert!(!q.sql.contains("archived_on"));
    }

    #[test]
    fn list_binds_in_textual_order() {
        let filter = QueryFilter {
            created_after: Some(100),
            ..QueryFilter::new(2, 10)
        };
        let q = list(&Numbered, &ITEMS, Some(3), Some(&filter));
        // filtered count: owner, created_after; total: owner; main: owner, created_after
        assert_eq!(
            q.args,
            vec![
                Value::Integer(3),
                Value::Integer(100),
                Value::Integer(3),
                Value::Integer(3),
                Value::Integer(100),
            ]
        );
        assert!(q.sql.contains("AS filtered_count"));
        assert!(q.sql.contains("AS total_count"));
        assert!(q.sql.ends_with("ORDER BY items.id ASC LIMIT 10 OFFSET 10"));
        let first = q.sql.find("?1").unwrap();
        let last = q.sql.find("?5").unwrap();
        assert!(first < last);
    }

    #[test]
    fn list_without_filter_uses_default_page() {
        let q = list(&Numbered, &WEBHOOKS, Some(1), None);
        assert!(q.sql.ends_with("LIMIT 20 OFFSET 0"));
    }

    #[test]
    fn include_archived_drops_the_archive_clause_from_the_page() {
        let filter = QueryFilter {
            include_archived: true,
            ..QueryFilter::default()
        };
        let q = list(&Numbered, &ITEMS, Some(1), Some(&filter));
        let main = &q.sql[q.sql.rfind("FROM items").unwrap()..];
        assert!(!main.contains("archived_on IS NULL"));
        assert!(q.sql.contains("total_count"));
    }

    #[test]
    fn archive_only_matches_live_rows() {
        let q = archive(&Numbered, &ITEMS, 4, Some(2));
        assert_eq!(
            q.sql,
            "UPDATE items SET last_updated_on = NOW, archived_on = NOW WHERE items.archived_on IS NULL \
             AND items.belongs_to_account = ?1 AND items.id = ?2"
        );
    }

    #[test]
    fn insert_appends_returning_only_when_asked() {
        let values = || vec![("name", Value::Text("a".into())), ("details", Value::Text(String::new()))];
        assert_eq!(
            insert(&Numbered, &ITEMS, values(), false).sql,
            "INSERT INTO items (name, details) VALUES (?1, ?2)"
        );
        assert!(insert(&Numbered, &ITEMS, values(), true).sql.ends_with(" RETURNING id"));
    }

    #[test]
    fn update_stamps_last_updated() {
        let q = update(&Numbered, &ACCOUNTS, vec![("name", Value::Text("n".into()))], 7, Some(1));
        assert!(q.sql.starts_with("UPDATE accounts SET name = ?1, last_updated_on = NOW WHERE"));
        assert_eq!(q.args.len(), 3);
    }

    #[test]
    fn batch_is_half_open() {
        let q = batch(&Numbered, &ITEMS, 1001, 2001);
        assert!(q.sql.contains("items.id >= ?1 AND items.id < ?2"));
        assert_eq!(q.args, vec![Value::Integer(1001), Value::Integer(2001)]);
    }

    #[test]
    fn audit_lookup_plucks_the_context_key() {
        let q = audit_entries_for(&Numbered, "item_id", 12);
        assert!(q.sql.contains("WHERE pluck(audit_log.context, item_id) = ?1"));
        assert!(q.sql.ends_with("ORDER BY audit_log.created_on ASC, audit_log.id ASC"));
    }

    #[test]
    fn out_of_range_integers_saturate() {
        assert_eq!(int(7), Value::Integer(7));
        assert_eq!(int(u64::MAX), Value::Integer(i64::MAX));
        assert_eq!(opt_int(None), Value::Null);
    }
}
