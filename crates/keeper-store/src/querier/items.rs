//! Item operations.

use keeper_core::ids::{new_external_id, unix_now};
use keeper_core::{AuditLogEntry, FieldChangeSummary, Item, ItemCreationInput, ItemList, QueryFilter, audit};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::row_mapper::{map_audit_log_entry, map_item, scan_count, scan_exists, scan_list, scan_one};
use super::{Delivery, Querier, pagination, require, require_text};
use crate::errors::Result;

impl Querier {
    /// Fetch one item owned by `account_id`.
    pub async fn get_item(&self, cancel: &CancellationToken, item_id: u64, account_id: u64) -> Result<Item> {
        require(item_id, "item_id")?;
        require(account_id, "account_id")?;
        debug!(item_id, account_id, "get_item called");

        self.run(cancel, move |conn, b, _| {
            scan_one(conn, &b.build_get_item_query(item_id, account_id), map_item, "item")
        })
        .await
    }

    /// Whether a live item exists for `account_id`.
    pub async fn item_exists(&self, cancel: &CancellationToken, item_id: u64, account_id: u64) -> Result<bool> {
        require(item_id, "item_id")?;
        require(account_id, "account_id")?;
        debug!(item_id, account_id, "item_exists called");

        self.run(cancel, move |conn, b, _| scan_exists(conn, &b.build_item_exists_query(item_id, account_id)))
            .await
    }

    /// Count every live item.
    pub async fn get_all_items_count(&self, cancel: &CancellationToken) -> Result<u64> {
        debug!("get_all_items_count called");
        self.run(cancel, |conn, b, _| scan_count(conn, &b.build_get_all_items_count_query()))
            .await
    }

    /// Stream every live item in batches. Returns once the fetches are launched.
    pub async fn get_all_items(&self, cancel: &CancellationToken, delivery: Delivery<Item>) -> Result<()> {
        let count = self.get_all_items_count(cancel).await?;
        debug!(count, "get_all_items called");
        self.stream(
            cancel,
            count,
            delivery,
            |b, begin, end| b.build_get_batch_of_items_query(begin, end),
            map_item,
        )
    }

    /// One page of an account's items.
    pub async fn get_items(
        &self,
        cancel: &CancellationToken,
        account_id: u64,
        filter: Option<&QueryFilter>,
    ) -> Result<ItemList> {
        require(account_id, "account_id")?;
        debug!(account_id, "get_items called");

        let owned = filter.cloned();
        let scanned = self
            .run(cancel, move |conn, b, _| {
                scan_list(conn, &b.build_get_items_query(account_id, owned.as_ref()), map_item, true)
            })
            .await?;
        Ok(ItemList {
            pagination: pagination(filter, scanned.filtered_count, scanned.total_count),
            items: scanned.entities,
        })
    }

    /// Create an item and its creation audit entry.
    pub async fn create_item(&self, cancel: &CancellationToken, input: &ItemCreationInput, created_by: u64) -> Result<Item> {
        require(input.belongs_to_account, "belongs_to_account")?;
        require(created_by, "created_by")?;
        require_text(&input.name, "item name")?;
        debug!(account_id = input.belongs_to_account, created_by, "create_item called");

        let mut item = Item {
            id: 0,
            external_id: new_external_id(),
            name: input.name.clone(),
            details: input.details.clone(),
            created_on: unix_now(),
            last_updated_on: None,
            archived_on: None,
            belongs_to_account: input.belongs_to_account,
        };
        self.run(cancel, move |conn, b, exec| {
            let query = b.build_create_item_query(&item);
            let id = exec.perform_write_then_audit(conn, "creating item", &query, false, |id| {
                item.id = id;
                Some(audit::build_item_creation_event_entry(&item, created_by))
            })?;
            item.id = id;
            Ok(item)
        })
        .await
    }

    /// Persist an updated item and record `changes`.
    pub async fn update_item(
        &self,
        cancel: &CancellationToken,
        item: &Item,
        changed_by: u64,
        changes: &[FieldChangeSummary],
    ) -> Result<()> {
        require(item.id, "item_id")?;
        require(item.belongs_to_account, "belongs_to_account")?;
        require(changed_by, "changed_by")?;
        debug!(item_id = item.id, account_id = item.belongs_to_account, changed_by, "update_item called");

        let item = item.clone();
        let changes = changes.to_vec();
        self.run(cancel, move |conn, b, exec| {
            let query = b.build_update_item_query(&item);
            exec.perform_write_then_audit(conn, "updating item", &query, true, |_| {
                Some(audit::build_item_update_event_entry(changed_by, item.id, item.belongs_to_account, &changes))
            })
            .map(drop)
        })
        .await
    }

    /// Archive an item. Archiving twice is not-found.
    pub async fn archive_item(
        &self,
        cancel: &CancellationToken,
        item_id: u64,
        account_id: u64,
        archived_by: u64,
    ) -> Result<()> {
        require(item_id, "item_id")?;
        require(account_id, "account_id")?;
        require(archived_by, "archived_by")?;
        debug!(item_id, account_id, archived_by, "archive_item called");

        self.run(cancel, move |conn, b, exec| {
            let query = b.build_archive_item_query(item_id, account_id);
            exec.perform_write_then_audit(conn, "archiving item", &query, true, |_| {
                Some(audit::build_item_archive_event_entry(archived_by, item_id, account_id))
            })
            .map(drop)
        })
        .await
    }

    /// Audit history of an item, oldest first.
    pub async fn get_audit_log_entries_for_item(
        &self,
        cancel: &CancellationToken,
        item_id: u64,
    ) -> Result<Vec<AuditLogEntry>> {
        require(item_id, "item_id")?;
        debug!(item_id, "get_audit_log_entries_for_item called");

        self.run(cancel, move |conn, b, _| {
            let query = b.build_get_audit_log_entries_for_item_query(item_id);
            Ok(scan_list(conn, &query, map_audit_log_entry, false)?.entities)
        })
        .await
    }
}
