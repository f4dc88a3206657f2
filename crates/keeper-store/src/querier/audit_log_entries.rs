//! Audit log reads, plus standalone entries for events with no mutation.

use keeper_core::ids::{new_external_id, unix_now};
use keeper_core::{AuditLogEntry, AuditLogEntryCreationInput, AuditLogEntryList, QueryFilter};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::row_mapper::{map_audit_log_entry, scan_count, scan_list, scan_one};
use super::{Delivery, Querier, pagination, require};
use crate::errors::Result;

impl Querier {
    /// Fetch one audit entry.
    pub async fn get_audit_log_entry(&self, cancel: &CancellationToken, entry_id: u64) -> Result<AuditLogEntry> {
        require(entry_id, "audit_log_entry_id")?;
        debug!(entry_id, "get_audit_log_entry called");

        self.run(cancel, move |conn, b, _| {
            scan_one(conn, &b.build_get_audit_log_entry_query(entry_id), map_audit_log_entry, "audit log entry")
        })
        .await
    }

    /// Count every audit entry.
    pub async fn get_all_audit_log_entries_count(&self, cancel: &CancellationToken) -> Result<u64> {
        debug!("get_all_audit_log_entries_count called");
        self.run(cancel, |conn, b, _| scan_count(conn, &b.build_get_all_audit_log_entries_count_query()))
            .await
    }

    /// Stream every audit entry in batches.
    pub async fn get_all_audit_log_entries(
        &self,
        cancel: &CancellationToken,
        delivery: Delivery<AuditLogEntry>,
    ) -> Result<()> {
        let count = self.get_all_audit_log_entries_count(cancel).await?;
        debug!(count, "get_all_audit_log_entries called");
        self.stream(
            cancel,
            count,
            delivery,
            |b, begin, end| b.build_get_batch_of_audit_log_entries_query(begin, end),
            map_audit_log_entry,
        )
    }

    /// One page of audit entries.
    pub async fn get_audit_log_entries(
        &self,
        cancel: &CancellationToken,
        filter: Option<&QueryFilter>,
    ) -> Result<AuditLogEntryList> {
        debug!("get_audit_log_entries called");

        let owned = filter.cloned();
        let scanned = self
            .run(cancel, move |conn, b, _| {
                scan_list(conn, &b.build_get_audit_log_entries_query(owned.as_ref()), map_audit_log_entry, true)
            })
            .await?;
        Ok(AuditLogEntryList {
            pagination: pagination(filter, scanned.filtered_count, scanned.total_count),
            entries: scanned.entities,
        })
    }

    /// Append an entry that describes no row mutation, such as a login.
    pub async fn create_audit_log_entry(
        &self,
        cancel: &CancellationToken,
        input: &AuditLogEntryCreationInput,
    ) -> Result<()> {
        debug!(event_type = %input.event_type, "create_audit_log_entry called");

        let entry = AuditLogEntry {
            id: 0,
            external_id: new_external_id(),
            event_type: input.event_type,
            context: input.context.clone(),
            created_on: unix_now(),
        };
        self.run(cancel, move |conn, b, exec| {
            let query = b.build_create_audit_log_entry_query(&entry);
            exec.perform_write(conn, "writing audit log entry", &query, true).map(drop)
        })
        .await
    }
}
