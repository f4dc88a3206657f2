//! Account operations.

use keeper_core::ids::{new_external_id, unix_now};
use keeper_core::{Account, AccountCreationInput, AccountList, AuditLogEntry, FieldChangeSummary, QueryFilter, audit};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::row_mapper::{map_account, map_audit_log_entry, scan_count, scan_list, scan_one};
use super::{Delivery, Querier, pagination, require, require_text};
use crate::errors::Result;

impl Querier {
    /// Fetch one account owned by `user_id`.
    pub async fn get_account(&self, cancel: &CancellationToken, account_id: u64, user_id: u64) -> Result<Account> {
        require(account_id, "account_id")?;
        require(user_id, "user_id")?;
        debug!(account_id, user_id, "get_account called");

        self.run(cancel, move |conn, b, _| {
            scan_one(conn, &b.build_get_account_query(account_id, user_id), map_account, "account")
        })
        .await
    }

    /// Count every live account.
    pub async fn get_all_accounts_count(&self, cancel: &CancellationToken) -> Result<u64> {
        debug!("get_all_accounts_count called");
        self.run(cancel, |conn, b, _| scan_count(conn, &b.build_get_all_accounts_count_query()))
            .await
    }

    /// Stream every live account in batches.
    pub async fn get_all_accounts(&self, cancel: &CancellationToken, delivery: Delivery<Account>) -> Result<()> {
        let count = self.get_all_accounts_count(cancel).await?;
        debug!(count, "get_all_accounts called");
        self.stream(
            cancel,
            count,
            delivery,
            |b, begin, end| b.build_get_batch_of_accounts_query(begin, end),
            map_account,
        )
    }

    /// One page of a user's accounts.
    pub async fn get_accounts(
        &self,
        cancel: &CancellationToken,
        user_id: u64,
        filter: Option<&QueryFilter>,
    ) -> Result<AccountList> {
        require(user_id, "user_id")?;
        debug!(user_id, "get_accounts called");

        let owned = filter.cloned();
        let scanned = self
            .run(cancel, move |conn, b, _| {
                scan_list(conn, &b.build_get_accounts_query(user_id, owned.as_ref()), map_account, true)
            })
            .await?;
        Ok(AccountList {
            pagination: pagination(filter, scanned.filtered_count, scanned.total_count),
            accounts: scanned.entities,
        })
    }

    /// Create an account. The owning user is recorded as the actor.
    pub async fn create_account(&self, cancel: &CancellationToken, input: &AccountCreationInput) -> Result<Account> {
        require(input.belongs_to_user, "belongs_to_user")?;
        require_text(&input.name, "account name")?;
        debug!(user_id = input.belongs_to_user, "create_account called");

        let mut account = Account {
            id: 0,
            external_id: new_external_id(),
            name: input.name.clone(),
            created_on: unix_now(),
            last_updated_on: None,
            archived_on: None,
            belongs_to_user: input.belongs_to_user,
        };
        self.run(cancel, move |conn, b, exec| {
            let query = b.build_create_account_query(&account);
            let id = exec.perform_write_then_audit(conn, "creating account", &query, false, |id| {
                account.id = id;
                Some(audit::build_account_creation_event_entry(&account))
            })?;
            account.id = id;
            Ok(account)
        })
        .await
    }

    /// Persist an updated account and record `changes`.
    pub async fn update_account(
        &self,
        cancel: &CancellationToken,
        account: &Account,
        changed_by: u64,
        changes: &[FieldChangeSummary],
    ) -> Result<()> {
        require(account.id, "account_id")?;
        require(account.belongs_to_user, "belongs_to_user")?;
        require(changed_by, "changed_by")?;
        debug!(account_id = account.id, changed_by, "update_account called");

        let account = account.clone();
        let changes = changes.to_vec();
        self.run(cancel, move |conn, b, exec| {
            let query = b.build_update_account_query(&account);
            exec.perform_write_then_audit(conn, "updating account", &query, true, |_| {
                Some(audit::build_account_update_event_entry(changed_by, account.id, &changes))
            })
            .map(drop)
        })
        .await
    }

    /// Archive an account owned by `user_id`.
    pub async fn archive_account(
        &self,
        cancel: &CancellationToken,
        account_id: u64,
        user_id: u64,
        archived_by: u64,
    ) -> Result<()> {
        require(account_id, "account_id")?;
        require(user_id, "user_id")?;
        require(archived_by, "archived_by")?;
        debug!(account_id, user_id, archived_by, "archive_account called");

        self.run(cancel, move |conn, b, exec| {
            let query = b.build_archive_account_query(account_id, user_id);
            exec.perform_write_then_audit(conn, "archiving account", &query, true, |_| {
                Some(audit::build_account_archive_event_entry(archived_by, account_id))
            })
            .map(drop)
        })
        .await
    }

    /// Audit history of an account.
    pub async fn get_audit_log_entries_for_account(
        &self,
        cancel: &CancellationToken,
        account_id: u64,
    ) -> Result<Vec<AuditLogEntry>> {
        require(account_id, "account_id")?;
        debug!(account_id, "get_audit_log_entries_for_account called");

        self.run(cancel, move |conn, b, _| {
            let query = b.build_get_audit_log_entries_for_account_query(account_id);
            Ok(scan_list(conn, &query, map_audit_log_entry, false)?.entities)
        })
        .await
    }
}
