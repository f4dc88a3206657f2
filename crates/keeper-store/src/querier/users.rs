//! User operations, plus test-user seeding for `migrate`.

use keeper_core::ids::{new_external_id, unix_now};
use keeper_core::{
    Account, AuditLogEntry, FieldChangeSummary, QueryFilter, SERVICE_ADMIN_ROLE, SERVICE_USER_ROLE,
    TestUserCreationConfig, User, UserCreationInput, UserList, UserReputation, audit,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::row_mapper::{map_audit_log_entry, map_user, scan_count, scan_exists, scan_list, scan_one};
use super::{Delivery, Querier, pagination, require, require_text};
use crate::errors::Result;

/// Two-factor secret stored for seeded test users.
const TEST_USER_TWO_FACTOR_SECRET: &str =
    "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

impl Querier {
    /// Fetch one live user.
    pub async fn get_user(&self, cancel: &CancellationToken, user_id: u64) -> Result<User> {
        require(user_id, "user_id")?;
        debug!(user_id, "get_user called");

        self.run(cancel, move |conn, b, _| scan_one(conn, &b.build_get_user_query(user_id), map_user, "user"))
            .await
    }

    /// Fetch a live user by username.
    pub async fn get_user_by_username(&self, cancel: &CancellationToken, username: &str) -> Result<User> {
        require_text(username, "username")?;
        debug!(username, "get_user_by_username called");

        let username = username.to_owned();
        self.run(cancel, move |conn, b, _| {
            scan_one(conn, &b.build_get_user_by_username_query(&username), map_user, "user")
        })
        .await
    }

    /// Count every live user.
    pub async fn get_all_users_count(&self, cancel: &CancellationToken) -> Result<u64> {
        debug!("get_all_users_count called");
        self.run(cancel, |conn, b, _| scan_count(conn, &b.build_get_all_users_count_query()))
            .await
    }

    /// Stream every live user in batches.
    pub async fn get_all_users(&self, cancel: &CancellationToken, delivery: Delivery<User>) -> Result<()> {
        let count = self.get_all_users_count(cancel).await?;
        debug!(count, "get_all_users called");
        self.stream(
            cancel,
            count,
            delivery,
            |b, begin, end| b.build_get_batch_of_users_query(begin, end),
            map_user,
        )
    }

    /// One page of users.
    pub async fn get_users(&self, cancel: &CancellationToken, filter: Option<&QueryFilter>) -> Result<UserList> {
        debug!("get_users called");

        let owned = filter.cloned();
        let scanned = self
            .run(cancel, move |conn, b, _| {
                scan_list(conn, &b.build_get_users_query(owned.as_ref()), map_user, true)
            })
            .await?;
        Ok(UserList {
            pagination: pagination(filter, scanned.filtered_count, scanned.total_count),
            users: scanned.entities,
        })
    }

    /// Register a user. Users record themselves as the actor.
    pub async fn create_user(&self, cancel: &CancellationToken, input: &UserCreationInput) -> Result<User> {
        require_text(&input.username, "username")?;
        require_text(&input.hashed_password, "hashed_password")?;
        debug!(username = %input.username, "create_user called");

        let service_roles = if input.service_roles.is_empty() {
            vec![SERVICE_USER_ROLE.to_owned()]
        } else {
            input.service_roles.clone()
        };
        let user = User {
            external_id: new_external_id(),
            username: input.username.clone(),
            hashed_password: input.hashed_password.clone(),
            two_factor_secret: input.two_factor_secret.clone(),
            service_roles,
            created_on: unix_now(),
            ..User::default()
        };
        self.run(cancel, move |conn, b, exec| {
            let mut user = user;
            let query = b.build_create_user_query(&user);
            let id = exec.perform_write_then_audit(conn, "creating user", &query, false, |id| {
                user.id = id;
                Some(audit::build_user_creation_event_entry(&user))
            })?;
            user.id = id;
            Ok(user)
        })
        .await
    }

    /// Persist an updated user and record `changes`.
    pub async fn update_user(
        &self,
        cancel: &CancellationToken,
        user: &User,
        changed_by: u64,
        changes: &[FieldChangeSummary],
    ) -> Result<()> {
        require(user.id, "user_id")?;
        require(changed_by, "changed_by")?;
        debug!(user_id = user.id, changed_by, "update_user called");

        let user = user.clone();
        let changes = changes.to_vec();
        self.run(cancel, move |conn, b, exec| {
            let query = b.build_update_user_query(&user);
            exec.perform_write_then_audit(conn, "updating user", &query, true, |_| {
                Some(audit::build_user_update_event_entry(changed_by, user.id, &changes))
            })
            .map(drop)
        })
        .await
    }

    /// Archive a user.
    pub async fn archive_user(&self, cancel: &CancellationToken, user_id: u64, archived_by: u64) -> Result<()> {
        require(user_id, "user_id")?;
        require(archived_by, "archived_by")?;
        debug!(user_id, archived_by, "archive_user called");

        self.run(cancel, move |conn, b, exec| {
            let query = b.build_archive_user_query(user_id);
            exec.perform_write_then_audit(conn, "archiving user", &query, true, |_| {
                Some(audit::build_user_archive_event_entry(archived_by, user_id))
            })
            .map(drop)
        })
        .await
    }

    /// Audit history of a user.
    pub async fn get_audit_log_entries_for_user(
        &self,
        cancel: &CancellationToken,
        user_id: u64,
    ) -> Result<Vec<AuditLogEntry>> {
        require(user_id, "user_id")?;
        debug!(user_id, "get_audit_log_entries_for_user called");

        self.run(cancel, move |conn, b, _| {
            let query = b.build_get_audit_log_entries_for_user_query(user_id);
            Ok(scan_list(conn, &query, map_audit_log_entry, false)?.entities)
        })
        .await
    }

    /// Create the configured test user and a personal account unless the
    /// username is already taken, archived users included.
    ///
    /// The user, the account and both audit entries commit together.
    pub(super) async fn ensure_test_user(
        &self,
        cancel: &CancellationToken,
        config: &TestUserCreationConfig,
    ) -> Result<()> {
        require_text(&config.username, "username")?;

        let role = if config.is_service_admin { SERVICE_ADMIN_ROLE } else { SERVICE_USER_ROLE };
        let now = unix_now();
        let mut user = User {
            external_id: new_external_id(),
            username: config.username.clone(),
            hashed_password: config.hashed_password.clone(),
            two_factor_secret: TEST_USER_TWO_FACTOR_SECRET.to_owned(),
            two_factor_secret_verified_on: Some(now),
            service_roles: vec![role.to_owned()],
            reputation: UserReputation::Good,
            created_on: now,
            ..User::default()
        };
        let mut account = Account {
            external_id: new_external_id(),
            name: config.username.clone(),
            created_on: now,
            ..Account::default()
        };

        let created = self
            .run(cancel, move |conn, b, exec| {
                if scan_exists(conn, &b.build_username_taken_query(&user.username))? {
                    return Ok(None);
                }
                exec.transaction(conn, |writes| {
                    let query = b.build_create_user_query(&user);
                    let user_id = writes.write_then_audit("creating user", &query, false, |id| {
                        user.id = id;
                        Some(audit::build_user_creation_event_entry(&user))
                    })?;
                    account.belongs_to_user = user_id;
                    let query = b.build_create_account_query(&account);
                    let account_id = writes.write_then_audit("creating account", &query, false, |id| {
                        account.id = id;
                        Some(audit::build_account_creation_event_entry(&account))
                    })?;
                    Ok(Some((user_id, account_id)))
                })
            })
            .await?;

        match created {
            Some((user_id, account_id)) => info!(user_id, account_id, "test user created"),
            None => debug!(username = %config.username, "test user already exists"),
        }
        Ok(())
    }
}
