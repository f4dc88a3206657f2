//! Webhook operations.

use keeper_core::ids::{new_external_id, unix_now};
use keeper_core::{
    AuditLogEntry, FieldChangeSummary, QueryFilter, Webhook, WebhookCreationInput, WebhookList, audit,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::row_mapper::{map_audit_log_entry, map_webhook, scan_count, scan_list, scan_one};
use super::{Delivery, Querier, pagination, require, require_text};
use crate::errors::Result;

impl Querier {
    /// Fetch one webhook owned by `account_id`.
    pub async fn get_webhook(&self, cancel: &CancellationToken, webhook_id: u64, account_id: u64) -> Result<Webhook> {
        require(webhook_id, "webhook_id")?;
        require(account_id, "account_id")?;
        debug!(webhook_id, account_id, "get_webhook called");

        self.run(cancel, move |conn, b, _| {
            scan_one(conn, &b.build_get_webhook_query(webhook_id, account_id), map_webhook, "webhook")
        })
        .await
    }

    /// Count every live webhook.
    pub async fn get_all_webhooks_count(&self, cancel: &CancellationToken) -> Result<u64> {
        debug!("get_all_webhooks_count called");
        self.run(cancel, |conn, b, _| scan_count(conn, &b.build_get_all_webhooks_count_query()))
            .await
    }

    /// Stream every live webhook in batches.
    pub async fn get_all_webhooks(&self, cancel: &CancellationToken, delivery: Delivery<Webhook>) -> Result<()> {
        let count = self.get_all_webhooks_count(cancel).await?;
        debug!(count, "get_all_webhooks called");
        self.stream(
            cancel,
            count,
            delivery,
            |b, begin, end| b.build_get_batch_of_webhooks_query(begin, end),
            map_webhook,
        )
    }

    /// One page of an account's webhooks.
    pub async fn get_webhooks(
        &self,
        cancel: &CancellationToken,
        account_id: u64,
        filter: Option<&QueryFilter>,
    ) -> Result<WebhookList> {
        require(account_id, "account_id")?;
        debug!(account_id, "get_webhooks called");

        let owned = filter.cloned();
        let scanned = self
            .run(cancel, move |conn, b, _| {
                scan_list(conn, &b.build_get_webhooks_query(account_id, owned.as_ref()), map_webhook, true)
            })
            .await?;
        Ok(WebhookList {
            pagination: pagination(filter, scanned.filtered_count, scanned.total_count),
            webhooks: scanned.entities,
        })
    }

    /// Create a webhook and its creation audit entry.
    pub async fn create_webhook(
        &self,
        cancel: &CancellationToken,
        input: &WebhookCreationInput,
        created_by: u64,
    ) -> Result<Webhook> {
        require(input.belongs_to_account, "belongs_to_account")?;
        require(created_by, "created_by")?;
        require_text(&input.name, "webhook name")?;
        require_text(&input.url, "webhook url")?;
        debug!(account_id = input.belongs_to_account, created_by, "create_webhook called");

        let mut webhook = Webhook {
            id: 0,
            external_id: new_external_id(),
            name: input.name.clone(),
            content_type: input.content_type.clone(),
            url: input.url.clone(),
            method: input.method.clone(),
            events: input.events.clone(),
            data_types: input.data_types.clone(),
            topics: input.topics.clone(),
            created_on: unix_now(),
            last_updated_on: None,
            archived_on: None,
            belongs_to_account: input.belongs_to_account,
        };
        self.run(cancel, move |conn, b, exec| {
            let query = b.build_create_webhook_query(&webhook);
            let id = exec.perform_write_then_audit(conn, "creating webhook", &query, false, |id| {
                webhook.id = id;
                Some(audit::build_webhook_creation_event_entry(&webhook, created_by))
            })?;
            webhook.id = id;
            Ok(webhook)
        })
        .await
    }

    /// Persist an updated webhook and record `changes`.
    pub async fn update_webhook(
        &self,
        cancel: &CancellationToken,
        webhook: &Webhook,
        changed_by: u64,
        changes: &[FieldChangeSummary],
    ) -> Result<()> {
        require(webhook.id, "webhook_id")?;
        require(webhook.belongs_to_account, "belongs_to_account")?;
        require(changed_by, "changed_by")?;
        debug!(webhook_id = webhook.id, changed_by, "update_webhook called");

        let webhook = webhook.clone();
        let changes = changes.to_vec();
        self.run(cancel, move |conn, b, exec| {
            let query = b.build_update_webhook_query(&webhook);
            exec.perform_write_then_audit(conn, "updating webhook", &query, true, |_| {
                Some(audit::build_webhook_update_event_entry(
                    changed_by,
                    webhook.id,
                    webhook.belongs_to_account,
                    &changes,
                ))
            })
            .map(drop)
        })
        .await
    }

    /// Archive a webhook.
    pub async fn archive_webhook(
        &self,
        cancel: &CancellationToken,
        webhook_id: u64,
        account_id: u64,
        archived_by: u64,
    ) -> Result<()> {
        require(webhook_id, "webhook_id")?;
        require(account_id, "account_id")?;
        require(archived_by, "archived_by")?;
        debug!(webhook_id, account_id, archived_by, "archive_webhook called");

        self.run(cancel, move |conn, b, exec| {
            let query = b.build_archive_webhook_query(webhook_id, account_id);
            exec.perform_write_then_audit(conn, "archiving webhook", &query, true, |_| {
                Some(audit::build_webhook_archive_event_entry(archived_by, webhook_id, account_id))
            })
            .map(drop)
        })
        .await
    }

    /// Audit history of a webhook.
    pub async fn get_audit_log_entries_for_webhook(
        &self,
        cancel: &CancellationToken,
        webhook_id: u64,
    ) -> Result<Vec<AuditLogEntry>> {
        require(webhook_id, "webhook_id")?;
        debug!(webhook_id, "get_audit_log_entries_for_webhook called");

        self.run(cancel, move |conn, b, _| {
            let query = b.build_get_audit_log_entries_for_webhook_query(webhook_id);
            Ok(scan_list(conn, &query, map_audit_log_entry, false)?.entities)
        })
        .await
    }
}
