//! SQL generation.
//!
//! A [`QueryBuilder`] turns one logical operation into a [`Query`]: statement
//! text plus positional arguments. There is one builder type per backend
//! ([`Sqlite`], [`Postgres`], [`MariaDb`]); each supplies its [`Dialect`]
//! hooks and migrations, and inherits the statement shapes from [`base`].
//!
//! The querier picks a builder once at construction and never inspects the
//! SQL it gets back.

pub mod base;
mod mariadb;
mod postgres;
mod sqlite;

use std::fmt;
use std::sync::Arc;

use keeper_core::delimited::{LIST_SEPARATOR, join_delimited};
use keeper_core::{Account, AuditLogEntry, Item, OAuth2Client, QueryFilter, User, Webhook};
use keeper_settings::Provider;
use rusqlite::types::Value;

use crate::migrations::Migration;

pub use mariadb::MariaDb;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use base::{ACCOUNTS, AUDIT_LOG, ITEMS, OAUTH2_CLIENTS, USERS, WEBHOOKS, int, opt_int};

/// Statement text and its positional arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    /// SQL text.
    pub sql: String,
    /// Arguments in placeholder order.
    pub args: Vec<Value>,
}

/// Backend-specific fragments the shared builders splice in.
pub trait Dialect: Send + Sync {
    /// Placeholder for the `position`th argument (1-based).
    fn placeholder(&self, position: usize) -> String;

    /// Expression evaluating to the current unix time in seconds.
    fn current_unix_time(&self) -> &'static str;

    /// Expression extracting top-level `key` from JSON `column`.
    fn json_pluck(&self, column: &str, key: &str) -> String;

    /// Suffix making an insert return the generated key, or empty.
    fn returning_id(&self) -> &'static str {
        ""
    }
}

fn text(value: &str) -> Value {
    Value::Text(value.to_owned())
}

fn list(values: &[String]) -> Value {
    Value::Text(join_delimited(values, LIST_SEPARATOR))
}

/// Builds every statement the querier runs.
pub trait QueryBuilder: Dialect + fmt::Debug {
    /// Backend name, for logs.
    fn name(&self) -> &'static str;

    /// Schema migrations for this backend, oldest first.
    fn migrations(&self) -> &'static [Migration];

    // ── Items ───────────────────────────────────────────────────────────

    /// Fetch one item owned by an account.
    fn build_get_item_query(&self, item_id: u64, account_id: u64) -> Query {
        base::get_by_id(self, &ITEMS, item_id, Some(account_id))
    }

    /// Whether an item exists for an account.
    fn build_item_exists_query(&self, item_id: u64, account_id: u64) -> Query {
        base::exists(self, &ITEMS, item_id, Some(account_id))
    }

    /// Count every live item.
    fn build_get_all_items_count_query(&self) -> Query {
        base::count_all(self, &ITEMS)
    }

    /// Items with ids in `[begin, end)`.
    fn build_get_batch_of_items_query(&self, begin: u64, end: u64) -> Query {
        base::batch(self, &ITEMS, begin, end)
    }

    /// One page of an account's items.
    fn build_get_items_query(&self, account_id: u64, filter: Option<&QueryFilter>) -> Query {
        base::list(self, &ITEMS, Some(account_id), filter)
    }

    /// Insert an item.
    fn build_create_item_query(&self, item: &Item) -> Query {
        base::insert(
            self,
            &ITEMS,
            vec![
                ("external_id", text(&item.external_id)),
                ("name", text(&item.name)),
                ("details", text(&item.details)),
                ("created_on", int(item.created_on)),
                ("belongs_to_account", int(item.belongs_to_account)),
            ],
            true,
        )
    }

    /// Overwrite an item's mutable fields.
    fn build_update_item_query(&self, item: &Item) -> Query {
        base::update(
            self,
            &ITEMS,
            vec![("name", text(&item.name)), ("details", text(&item.details))],
            item.id,
            Some(item.belongs_to_account),
        )
    }

    /// Archive an item.
    fn build_archive_item_query(&self, item_id: u64, account_id: u64) -> Query {
        base::archive(self, &ITEMS, item_id, Some(account_id))
    }

    /// Audit history of an item.
    fn build_get_audit_log_entries_for_item_query(&self, item_id: u64) -> Query {
        base::audit_entries_for(self, keeper_core::audit::ITEM_ASSIGNMENT_KEY, item_id)
    }

    // ── Webhooks ────────────────────────────────────────────────────────

    /// Fetch one webhook owned by an account.
    fn build_get_webhook_query(&self, webhook_id: u64, account_id: u64) -> Query {
        base::get_by_id(self, &WEBHOOKS, webhook_id, Some(account_id))
    }

    /// Count every live webhook.
    fn build_get_all_webhooks_count_query(&self) -> Query {
        base::count_all(self, &WEBHOOKS)
    }

    /// Webhooks with ids in `[begin, end)`.
    fn build_get_batch_of_webhooks_query(&self, begin: u64, end: u64) -> Query {
        base::batch(self, &WEBHOOKS, begin, end)
    }

    /// One page of an account's webhooks.
    fn build_get_webhooks_query(&self, account_id: u64, filter: Option<&QueryFilter>) -> Query {
        base::list(self, &WEBHOOKS, Some(account_id), filter)
    }

    /// Insert a webhook.
    fn build_create_webhook_query(&self, webhook: &Webhook) -> Query {
        base::insert(
            self,
            &WEBHOOKS,
            vec![
                ("external_id", text(&webhook.external_id)),
                ("name", text(&webhook.name)),
                ("content_type", text(&webhook.content_type)),
                ("url", text(&webhook.url)),
                ("method", text(&webhook.method)),
                ("events", list(&webhook.events)),
                ("data_types", list(&webhook.data_types)),
                ("topics", list(&webhook.topics)),
                ("created_on", int(webhook.created_on)),
                ("belongs_to_account", int(webhook.belongs_to_account)),
            ],
            true,
        )
    }

    /// Overwrite a webhook's mutable fields.
    fn build_update_webhook_query(&self, webhook: &Webhook) -> Query {
        base::update(
            self,
            &WEBHOOKS,
            vec![
                ("name", text(&webhook.name)),
                ("content_type", text(&webhook.content_type)),
                ("url", text(&webhook.url)),
                ("method", text(&webhook.method)),
                ("events", list(&webhook.events)),
                ("data_types", list(&webhook.data_types)),
                ("topics", list(&webhook.topics)),
            ],
            webhook.id,
            Some(webhook.belongs_to_account),
        )
    }

    /// Archive a webhook.
    fn build_archive_webhook_query(&self, webhook_id: u64, account_id: u64) -> Query {
        base::archive(self, &WEBHOOKS, webhook_id, Some(account_id))
    }

    /// Audit history of a webhook.
    fn build_get_audit_log_entries_for_webhook_query(&self, webhook_id: u64) -> Query {
        base::audit_entries_for(self, keeper_core::audit::WEBHOOK_ASSIGNMENT_KEY, webhook_id)
    }

    // ── OAuth2 clients ──────────────────────────────────────────────────

    /// Fetch one OAuth2 client owned by a user.
    fn build_get_oauth2_client_query(&self, client_id: u64, user_id: u64) -> Query {
        base::get_by_id(self, &OAUTH2_CLIENTS, client_id, Some(user_id))
    }

    /// Fetch an OAuth2 client by its public client ID.
    fn build_get_oauth2_client_by_client_id_query(&self, client_id: &str) -> Query {
        base::get_by_column(self, &OAUTH2_CLIENTS, "client_id", text(client_id))
    }

    /// Count every live OAuth2 client.
    fn build_get_all_oauth2_clients_count_query(&self) -> Query {
        base::count_all(self, &OAUTH2_CLIENTS)
    }

    /// OAuth2 clients with ids in `[begin, end)`.
    fn build_get_batch_of_oauth2_clients_query(&self, begin: u64, end: u64) -> Query {
        base::batch(self, &OAUTH2_CLIENTS, begin, end)
    }

    /// One page of a user's OAuth2 clients.
    fn build_get_oauth2_clients_query(&self, user_id: u64, filter: Option<&QueryFilter>) -> Query {
        base::list(self, &OAUTH2_CLIENTS, Some(user_id), filter)
    }

    /// Insert an OAuth2 client.
    fn build_create_oauth2_client_query(&self, client: &OAuth2Client) -> Query {
        base::insert(
            self,
            &OAUTH2_CLIENTS,
            vec![
                ("external_id", text(&client.external_id)),
                ("name", text(&client.name)),
                ("client_id", text(&client.client_id)),
                ("client_secret", text(&client.client_secret)),
                ("redirect_uri", text(&client.redirect_uri)),
                ("scopes", list(&client.scopes)),
                ("created_on", int(client.created_on)),
                ("belongs_to_user", int(client.belongs_to_user)),
            ],
            true,
        )
    }

    /// Overwrite an OAuth2 client's mutable fields.
    fn build_update_oauth2_client_query(&self, client: &OAuth2Client) -> Query {
        base::update(
            self,
            &OAUTH2_CLIENTS,
            vec![
                ("name", text(&client.name)),
                ("redirect_uri", text(&client.redirect_uri)),
                ("scopes", list(&client.scopes)),
            ],
            client.id,
            Some(client.belongs_to_user),
        )
    }

    /// Archive an OAuth2 client.
    fn build_archive_oauth2_client_query(&self, client_id: u64, user_id: u64) -> Query {
        base::archive(self, &OAUTH2_CLIENTS, client_id, Some(user_id))
    }

    /// Audit history of an OAuth2 client.
    fn build_get_audit_log_entries_for_oauth2_client_query(&self, client_id: u64) -> Query {
        base::audit_entries_for(self, keeper_core::audit::OAUTH2_CLIENT_ASSIGNMENT_KEY, client_id)
    }

    // ── Users ───────────────────────────────────────────────────────────

    /// Fetch one user.
    fn build_get_user_query(&self, user_id: u64) -> Query {
        base::get_by_id(self, &USERS, user_id, None)
    }

    /// Fetch a user by username.
    fn build_get_user_by_username_query(&self, username: &str) -> Query {
        base::get_by_column(self, &USERS, "username", text(username))
    }

    /// Whether a username is taken, including by archived users.
    fn build_username_taken_query(&self, username: &str) -> Query {
        base::value_taken(self, &USERS, "username", text(username))
    }

    /// Count every live user.
    fn build_get_all_users_count_query(&self) -> Query {
        base::count_all(self, &USERS)
    }

    /// Users with ids in `[begin, end)`.
    fn build_get_batch_of_users_query(&self, begin: u64, end: u64) -> Query {
        base::batch(self, &USERS, begin, end)
    }

    /// One page of users.
    fn build_get_users_query(&self, filter: Option<&QueryFilter>) -> Query {
        base::list(self, &USERS, None, filter)
    }

    /// Insert a user.
    fn build_create_user_query(&self, user: &User) -> Query {
        base::insert(
            self,
            &USERS,
            vec![
                ("external_id", text(&user.external_id)),
                ("username", text(&user.username)),
                ("hashed_password", text(&user.hashed_password)),
                ("two_factor_secret", text(&user.two_factor_secret)),
                ("two_factor_secret_verified_on", opt_int(user.two_factor_secret_verified_on)),
                ("service_roles", list(&user.service_roles)),
                ("reputation", text(user.reputation.as_str())),
                ("created_on", int(user.created_on)),
            ],
            true,
        )
    }

    /// Overwrite a user's mutable fields.
    fn build_update_user_query(&self, user: &User) -> Query {
        base::update(
            self,
            &USERS,
            vec![
                ("username", text(&user.username)),
                ("avatar_src", user.avatar_src.clone().map_or(Value::Null, Value::Text)),
                ("hashed_password", text(&user.hashed_password)),
                ("requires_password_change", Value::from(user.requires_password_change)),
                ("password_last_changed_on", opt_int(user.password_last_changed_on)),
                ("two_factor_secret", text(&user.two_factor_secret)),
                ("two_factor_secret_verified_on", opt_int(user.two_factor_secret_verified_on)),
                ("service_roles", list(&user.service_roles)),
                ("reputation", text(user.reputation.as_str())),
                ("reputation_explanation", text(&user.reputation_explanation)),
            ],
            user.id,
            None,
        )
    }

    /// Archive a user.
    fn build_archive_user_query(&self, user_id: u64) -> Query {
        base::archive(self, &USERS, user_id, None)
    }

    /// Audit history of a user.
    fn build_get_audit_log_entries_for_user_query(&self, user_id: u64) -> Query {
        base::audit_entries_for(self, keeper_core::audit::USER_ASSIGNMENT_KEY, user_id)
    }

    // ── Accounts ────────────────────────────────────────────────────────

    /// Fetch one account owned by a user.
    fn build_get_account_query(&self, account_id: u64, user_id: u64) -> Query {
        base::get_by_id(self, &ACCOUNTS, account_id, Some(user_id))
    }

    /// Count every live account.
    fn build_get_all_accounts_count_query(&self) -> Query {
        base::count_all(self, &ACCOUNTS)
    }

    /// Accounts with ids in `[begin, end)`.
    fn build_get_batch_of_accounts_query(&self, begin: u64, end: u64) -> Query {
        base::batch(self, &ACCOUNTS, begin, end)
    }

    /// One page of a user's accounts.
    fn build_get_accounts_query(&self, user_id: u64, filter: Option<&QueryFilter>) -> Query {
        base::list(self, &ACCOUNTS, Some(user_id), filter)
    }

    /// Insert an account.
    fn build_create_account_query(&self, account: &Account) -> Query {
        base::insert(
            self,
            &ACCOUNTS,
            vec![
                ("external_id", text(&account.external_id)),
                ("name", text(&account.name)),
                ("created_on", int(account.created_on)),
                ("belongs_to_user", int(account.belongs_to_user)),
            ],
            true,
        )
    }

    /// Overwrite an account's mutable fields.
    fn build_update_account_query(&self, account: &Account) -> Query {
        base::update(
            self,
            &ACCOUNTS,
            vec![("name", text(&account.name))],
            account.id,
            Some(account.belongs_to_user),
        )
    }

    /// Archive an account.
    fn build_archive_account_query(&self, account_id: u64, user_id: u64) -> Query {
        base::archive(self, &ACCOUNTS, account_id, Some(user_id))
    }

    /// Audit history of an account.
    fn build_get_audit_log_entries_for_account_query(&self, account_id: u64) -> Query {
        base::audit_entries_for(self, keeper_core::audit::ACCOUNT_ASSIGNMENT_KEY, account_id)
    }

    // ── Audit log ───────────────────────────────────────────────────────

    /// Fetch one audit entry.
    fn build_get_audit_log_entry_query(&self, entry_id: u64) -> Query {
        base::get_by_id(self, &AUDIT_LOG, entry_id, None)
    }

    /// Count every audit entry.
    fn build_get_all_audit_log_entries_count_query(&self) -> Query {
        base::count_all(self, &AUDIT_LOG)
    }

    /// Audit entries with ids in `[begin, end)`.
    fn build_get_batch_of_audit_log_entries_query(&self, begin: u64, end: u64) -> Query {
        base::batch(self, &AUDIT_LOG, begin, end)
    }

    /// One page of audit entries.
    fn build_get_audit_log_entries_query(&self, filter: Option<&QueryFilter>) -> Query {
        base::list(self, &AUDIT_LOG, None, filter)
    }

    /// Append an audit entry. Never asks for the generated key.
    fn build_create_audit_log_entry_query(&self, entry: &AuditLogEntry) -> Query {
        base::insert(
            self,
            &AUDIT_LOG,
            vec![
                ("external_id", text(&entry.external_id)),
                ("event_type", text(entry.event_type.as_str())),
                ("context", Value::Text(serde_json::Value::Object(entry.context.clone()).to_string())),
                ("created_on", int(entry.created_on)),
            ],
            false,
        )
    }
}

/// Builder for `provider`.
pub fn for_provider(provider: Provider) -> Arc<dyn QueryBuilder> {
    match provider {
        Provider::Sqlite => Arc::new(Sqlite::new()),
        Provider::Postgres => Arc::new(Postgres),
        Provider::MariaDb => Arc::new(MariaDb),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use keeper_core::AuditLogEventType;

    use super::*;

    #[test]
    fn provider_selects_builder() {
        assert_eq!(for_provider(Provider::Sqlite).name(), "sqlite");
        assert_eq!(for_provider(Provider::Postgres).name(), "postgres");
        assert_eq!(for_provider(Provider::MariaDb).name(), "mariadb");
    }

    #[test]
    fn list_columns_are_joined() {
        let webhook = Webhook {
            events: vec!["item_created".into(), "item_archived".into()],
            ..Webhook::default()
        };
        let q = Sqlite::new().build_create_webhook_query(&webhook);
        assert!(q.args.contains(&Value::Text("item_created,item_archived".into())));
        assert!(q.args.contains(&Value::Text(String::new())));
    }

    #[test]
    fn audit_insert_never_returns_ids() {
        let entry = AuditLogEntry {
            id: 0,
            external_id: "e".into(),
            event_type: AuditLogEventType::ItemCreated,
            context: serde_json::Map::new(),
            created_on: 1,
        };
        let q = Postgres.build_create_audit_log_entry_query(&entry);
        assert!(!q.sql.contains("RETURNING"));
        assert_eq!(q.args[2], Value::Text("{}".into()));
    }

    #[test]
    fn user_update_keeps_nulls() {
        let user = User {
            id: 3,
            ..User::default()
        };
        let q = Sqlite::new().build_update_user_query(&user);
        assert_eq!(q.args[1], Value::Null);
        assert_eq!(q.args.last(), Some(&Value::Integer(3)));
    }
}
