//! Row decoding.
//!
//! Each entity has one mapping function that reads columns in exactly the
//! order its table descriptor selects them. List queries append two trailing
//! count columns; the `include_counts` flag tells the mapper to read them.
//!
//! A list either decodes completely or fails: the first bad row discards
//! everything decoded so far.

use std::fmt::Display;
use std::str::FromStr;

use keeper_core::delimited::{LIST_SEPARATOR, split_delimited};
use keeper_core::{
    Account, AuditLogContext, AuditLogEntry, AuditLogEventType, Item, OAuth2Client, User,
    UserReputation, Webhook,
};
use rusqlite::types::FromSql;
use rusqlite::{Connection, Row, params_from_iter};

use crate::errors::{Result, StoreError};
use crate::querybuilding::Query;

/// One decoded row plus the trailing counts, when present.
#[derive(Debug)]
pub struct Scanned<T> {
    /// The entity.
    pub entity: T,
    /// `filtered_count` column, or 0.
    pub filtered_count: u64,
    /// `total_count` column, or 0.
    pub total_count: u64,
}

/// Every row of a list query.
#[derive(Debug)]
pub struct ScannedList<T> {
    /// Entities in row order.
    pub entities: Vec<T>,
    /// First non-zero `filtered_count` seen.
    pub filtered_count: u64,
    /// First non-zero `total_count` seen.
    pub total_count: u64,
}

/// Signature shared by every entity mapper.
pub type MapRow<T> = fn(&Row<'_>, bool) -> Result<Scanned<T>>;

/// Sequential reader over a row's columns.
pub struct Columns<'a, 'r> {
    row: &'a Row<'r>,
    next: usize,
}

impl<'a, 'r> Columns<'a, 'r> {
    /// Start at column 0.
    pub fn new(row: &'a Row<'r>) -> Self {
        Self { row, next: 0 }
    }

    /// Next column as `T`.
    pub fn get<T: FromSql>(&mut self) -> Result<T> {
        let value = self.row.get(self.next).map_err(StoreError::RowDecode)?;
        self.next += 1;
        Ok(value)
    }

    /// Next column as a non-negative integer.
    pub fn unsigned(&mut self, column: &'static str) -> Result<u64> {
        let raw: i64 = self.get()?;
        to_unsigned(column, raw)
    }

    /// Next column as a nullable non-negative integer.
    pub fn opt_unsigned(&mut self, column: &'static str) -> Result<Option<u64>> {
        self.get::<Option<i64>>()?
            .map(|raw| to_unsigned(column, raw))
            .transpose()
    }

    /// Next column as a delimited list.
    pub fn list(&mut self) -> Result<Vec<String>> {
        let raw: String = self.get()?;
        Ok(split_delimited(&raw, LIST_SEPARATOR))
    }

    /// Next column parsed with [`FromStr`].
    pub fn parsed<T>(&mut self, column: &'static str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw: String = self.get()?;
        raw.parse().map_err(|e: T::Err| StoreError::DataIntegrity {
            column,
            reason: e.to_string(),
            value: raw,
        })
    }

    /// Next column as a JSON object.
    pub fn json_object(&mut self, column: &'static str) -> Result<AuditLogContext> {
        let raw: String = self.get()?;
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            Ok(_) => Err(StoreError::DataIntegrity {
                column,
                value: raw,
                reason: "not a JSON object".into(),
            }),
            Err(e) => Err(StoreError::DataIntegrity {
                column,
                reason: e.to_string(),
                value: raw,
            }),
        }
    }

    /// Finish the row, reading the trailing counts when present.
    pub fn finish<T>(mut self, entity: T, include_counts: bool) -> Result<Scanned<T>> {
        let (filtered_count, total_count) = if include_counts {
            (self.unsigned("filtered_count")?, self.unsigned("total_count")?)
        } else {
            (0, 0)
        };
        Ok(Scanned {
            entity,
            filtered_count,
            total_count,
        })
    }
}

fn to_unsigned(column: &'static str, raw: i64) -> Result<u64> {
    u64::try_from(raw).map_err(|e| StoreError::DataIntegrity {
        column,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

// ── Entity mappers ─────────────────────────────────────────────────────────

/// Decode an item.
pub fn map_item(row: &Row<'_>, include_counts: bool) -> Result<Scanned<Item>> {
    let mut c = Columns::new(row);
    let item = Item {
        id: c.unsigned("id")?,
        external_id: c.get()?,
        name: c.get()?,
        details: c.get()?,
        created_on: c.unsigned("created_on")?,
        last_updated_on: c.opt_unsigned("last_updated_on")?,
        archived_on: c.opt_unsigned("archived_on")?,
        belongs_to_account: c.unsigned("belongs_to_account")?,
    };
    c.finish(item, include_counts)
}

/// Decode a webhook.
pub fn map_webhook(row: &Row<'_>, include_counts: bool) -> Result<Scanned<Webhook>> {
    let mut c = Columns::new(row);
    let webhook = Webhook {
        id: c.unsigned("id")?,
        external_id: c.get()?,
        name: c.get()?,
        content_type: c.get()?,
        url: c.get()?,
        method: c.get()?,
        events: c.list()?,
        data_types: c.list()?,
        topics: c.list()?,
        created_on: c.unsigned("created_on")?,
        last_updated_on: c.opt_unsigned("last_updated_on")?,
        archived_on: c.opt_unsigned("archived_on")?,
        belongs_to_account: c.unsigned("belongs_to_account")?,
    };
    c.finish(webhook, include_counts)
}

/// Decode an OAuth2 client.
pub fn map_oauth2_client(row: &Row<'_>, include_counts: bool) -> Result<Scanned<OAuth2Client>> {
    let mut c = Columns::new(row);
    let client = OAuth2Client {
        id: c.unsigned("id")?,
        external_id: c.get()?,
        name: c.get()?,
        client_id: c.get()?,
        client_secret: c.get()?,
        redirect_uri: c.get()?,
        scopes: c.list()?,
        created_on: c.unsigned("created_on")?,
        last_updated_on: c.opt_unsigned("last_updated_on")?,
        archived_on: c.opt_unsigned("archived_on")?,
        belongs_to_user: c.unsigned("belongs_to_user")?,
    };
    c.finish(client, include_counts)
}

/// Decode a user.
pub fn map_user(row: &Row<'_>, include_counts: bool) -> Result<Scanned<User>> {
    let mut c = Columns::new(row);
    let user = User {
        id: c.unsigned("id")?,
        external_id: c.get()?,
        username: c.get()?,
        avatar_src: c.get()?,
        hashed_password: c.get()?,
        requires_password_change: c.get()?,
        password_last_changed_on: c.opt_unsigned("password_last_changed_on")?,
        two_factor_secret: c.get()?,
        two_factor_secret_verified_on: c.opt_unsigned("two_factor_secret_verified_on")?,
        service_roles: c.list()?,
        reputation: c.parsed::<UserReputation>("reputation")?,
        reputation_explanation: c.get()?,
        created_on: c.unsigned("created_on")?,
        last_updated_on: c.opt_unsigned("last_updated_on")?,
        archived_on: c.opt_unsigned("archived_on")?,
    };
    c.finish(user, include_counts)
}

/// Decode an account.
pub fn map_account(row: &Row<'_>, include_counts: bool) -> Result<Scanned<Account>> {
    let mut c = Columns::new(row);
    let account = Account {
        id: c.unsigned("id")?,
        external_id: c.get()?,
        name: c.get()?,
        created_on: c.unsigned("created_on")?,
        last_updated_on: c.opt_unsigned("last_updated_on")?,
        archived_on: c.opt_unsigned("archived_on")?,
        belongs_to_user: c.unsigned("belongs_to_user")?,
    };
    c.finish(account, include_counts)
}

/// Decode an audit log entry.
pub fn map_audit_log_entry(row: &Row<'_>, include_counts: bool) -> Result<Scanned<AuditLogEntry>> {
    let mut c = Columns::new(row);
    let entry = AuditLogEntry {
        id: c.unsigned("id")?,
        external_id: c.get()?,
        event_type: c.parsed::<AuditLogEventType>("event_type")?,
        context: c.json_object("context")?,
        created_on: c.unsigned("created_on")?,
    };
    c.finish(entry, include_counts)
}

// ── Query runners ──────────────────────────────────────────────────────────

const FETCH_STEP: &str = "fetching row";
const LIST_STEP: &str = "listing rows";
const COUNT_STEP: &str = "counting rows";
const EXISTS_STEP: &str = "checking existence";

/// Run `read`, wrapping any failure with `step` and the statement text.
fn read<T>(step: &'static str, query: &Query, work: impl FnOnce() -> Result<T>) -> Result<T> {
    work().map_err(|e| StoreError::step(step, query.sql.as_str(), e))
}

/// Run a point read. No row is [`StoreError::NotFound`] naming `what`.
pub fn scan_one<T>(conn: &Connection, query: &Query, map: MapRow<T>, what: &'static str) -> Result<T> {
    let found = read(FETCH_STEP, query, || {
        let mut stmt = conn.prepare(&query.sql)?;
        let mut rows = stmt.query(params_from_iter(query.args.iter()))?;
        match rows.next().map_err(StoreError::RowDecode)? {
            Some(row) => Ok(Some(map(row, false)?.entity)),
            None => Ok(None),
        }
    })?;
    found.ok_or(StoreError::NotFound(what))
}

/// Run a list read, decoding every row or none.
pub fn scan_list<T>(conn: &Connection, query: &Query, map: MapRow<T>, include_counts: bool) -> Result<ScannedList<T>> {
    read(LIST_STEP, query, || {
        let mut stmt = conn.prepare(&query.sql)?;
        let mut rows = stmt.query(params_from_iter(query.args.iter()))?;

        let mut list = ScannedList {
            entities: Vec::new(),
            filtered_count: 0,
            total_count: 0,
        };
        while let Some(row) = rows.next().map_err(StoreError::RowDecode)? {
            let scanned = map(row, include_counts)?;
            if list.filtered_count == 0 {
                list.filtered_count = scanned.filtered_count;
            }
            if list.total_count == 0 {
                list.total_count = scanned.total_count;
            }
            list.entities.push(scanned.entity);
        }
        Ok(list)
    })
}

/// Run a single-value `COUNT` query.
pub fn scan_count(conn: &Connection, query: &Query) -> Result<u64> {
    read(COUNT_STEP, query, || {
        let raw: i64 = conn.query_row(&query.sql, params_from_iter(query.args.iter()), |row| row.get(0))?;
        to_unsigned("count", raw)
    })
}

/// Run a single-value `EXISTS` query.
pub fn scan_exists(conn: &Connection, query: &Query) -> Result<bool> {
    read(EXISTS_STEP, query, || {
        Ok(conn.query_row(&query.sql, params_from_iter(query.args.iter()), |row| row.get(0))?)
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use rusqlite::types::Value;

    use super::*;

    fn select(sql: &str) -> Query {
        Query {
            sql: sql.into(),
            args: vec![],
        }
    }

    /// The failure under the step wrapper.
    fn cause(err: StoreError) -> StoreError {
        match err {
            StoreError::Step { source, .. } => *source,
            other => other,
        }
    }

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE w (id INTEGER, external_id TEXT, name TEXT, content_type TEXT, url TEXT,
               method TEXT, events TEXT, data_types TEXT, topics TEXT, created_on INTEGER,
               last_updated_on INTEGER, archived_on INTEGER, belongs_to_account INTEGER);
             INSERT INTO w VALUES (1, 'a', 'hook', 'application/json', 'https://x', 'POST',
               'item_created,item_archived', '', 'items', 100, NULL, NULL, 7);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn delimited_columns_split_and_empty_means_none() {
        let conn = conn();
        let webhook = scan_one(&conn, &select("SELECT * FROM w"), map_webhook, "webhook").unwrap();
        assert_eq!(webhook.events, vec!["item_created", "item_archived"]);
        assert!(webhook.data_types.is_empty());
        assert_eq!(webhook.topics, vec!["items"]);
        assert_eq!(webhook.belongs_to_account, 7);
    }

    #[test]
    fn trailing_counts_are_read_when_flagged() {
        let conn = conn();
        let list = scan_list(&conn, &select("SELECT *, 1, 3 FROM w"), map_webhook, true).unwrap();
        assert_eq!(list.entities.len(), 1);
        assert_eq!((list.filtered_count, list.total_count), (1, 3));
    }

    #[test]
    fn missing_row_is_not_found() {
        let conn = conn();
        let err = scan_one(&conn, &select("SELECT * FROM w WHERE id = 99"), map_webhook, "webhook").unwrap_err();
        assert_matches!(err, StoreError::NotFound("webhook"));
    }

    #[test]
    fn short_row_is_a_decode_error() {
        let conn = conn();
        let err = scan_one(&conn, &select("SELECT id, external_id FROM w"), map_webhook, "webhook").unwrap_err();
        assert_matches!(
            &err,
            StoreError::Step { step: "fetching row", statement, .. } if statement == "SELECT id, external_id FROM w"
        );
        assert_matches!(cause(err), StoreError::RowDecode(_));
    }

    #[test]
    fn negative_key_is_data_integrity() {
        let conn = conn();
        conn.execute_batch("UPDATE w SET id = -1").unwrap();
        let err = scan_one(&conn, &select("SELECT * FROM w"), map_webhook, "webhook").unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::DataIntegrity);
        assert_matches!(cause(err), StoreError::DataIntegrity { column: "id", .. });
    }

    #[test]
    fn unknown_reputation_is_data_integrity() {
        let conn = Connection::open_in_memory().unwrap();
        let query = Query {
            sql: "SELECT 1, 'e', 'u', NULL, 'h', 0, NULL, 's', NULL, 'service_user', ?1, '', 5, NULL, NULL".into(),
            args: vec![Value::Text("suspicious".into())],
        };
        let err = cause(scan_one(&conn, &query, map_user, "user").unwrap_err());
        assert_matches!(err, StoreError::DataIntegrity { column: "reputation", ref value, .. } if value == "suspicious");
    }

    #[test]
    fn audit_context_must_be_an_object() {
        let conn = Connection::open_in_memory().unwrap();
        let ok = select("SELECT 1, 'e', 'item_created', '{\"item_id\": 4}', 10");
        let entry = scan_one(&conn, &ok, map_audit_log_entry, "audit log entry").unwrap();
        assert_eq!(entry.context["item_id"], 4);

        let bad = select("SELECT 1, 'e', 'item_created', '[1]', 10");
        assert_matches!(
            cause(scan_one(&conn, &bad, map_audit_log_entry, "audit log entry").unwrap_err()),
            StoreError::DataIntegrity { column: "context", .. }
        );
    }

    #[test]
    fn count_and_exists() {
        let conn = conn();
        assert_eq!(scan_count(&conn, &select("SELECT COUNT(*) FROM w")).unwrap(), 1);
        assert!(scan_exists(&conn, &select("SELECT EXISTS (SELECT 1 FROM w)")).unwrap());
    }

    #[test]
    fn every_read_names_its_step_and_statement() {
        let conn = conn();
        let missing = select("SELECT * FROM gone");
        let steps = [
            scan_list(&conn, &missing, map_webhook, false).map(drop).unwrap_err(),
            scan_count(&conn, &select("SELECT COUNT(*) FROM gone")).map(drop).unwrap_err(),
            scan_exists(&conn, &select("SELECT EXISTS (SELECT 1 FROM gone)")).map(drop).unwrap_err(),
            scan_one(&conn, &missing, map_webhook, "webhook").map(drop).unwrap_err(),
        ];
        let named: Vec<_> = steps
            .iter()
            .map(|e| match e {
                StoreError::Step { step, statement, .. } => {
                    assert!(statement.contains("gone"));
                    *step
                }
                other => panic!("unwrapped read failure: {other}"),
            })
            .collect();
        assert_eq!(named, ["listing rows", "counting rows", "checking existence", "fetching row"]);
        assert!(steps.iter().all(|e| e.kind() == crate::errors::ErrorKind::Infrastructure));
    }
}
