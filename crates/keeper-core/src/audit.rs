//! Audit entry builders.
//!
//! Each mutating querier operation attaches one of these entries; the keys
//! below are what `get_audit_log_entries_for_*` filters on.

use serde::Serialize;
use serde_json::Value;

use crate::types::{
    Account, AuditLogEntryCreationInput, AuditLogEventType, FieldChangeSummary, Item,
    OAuth2Client, User, Webhook,
};

/// Who performed the change.
pub const PERFORMED_BY_KEY: &str = "performed_by";
/// Item an entry refers to.
pub const ITEM_ASSIGNMENT_KEY: &str = "item_id";
/// Webhook an entry refers to.
pub const WEBHOOK_ASSIGNMENT_KEY: &str = "webhook_id";
/// OAuth2 client an entry refers to.
pub const OAUTH2_CLIENT_ASSIGNMENT_KEY: &str = "oauth2_client_id";
/// User an entry refers to.
pub const USER_ASSIGNMENT_KEY: &str = "user_id";
/// Account an entry refers to.
pub const ACCOUNT_ASSIGNMENT_KEY: &str = "account_id";
/// Field diffs of an update.
pub const CHANGES_KEY: &str = "changes";
/// Snapshot of a newly created entity.
pub const CREATION_KEY: &str = "created";

fn to_value(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn entry(event: AuditLogEventType, key: &str, id: u64, performed_by: u64) -> AuditLogEntryCreationInput {
    AuditLogEntryCreationInput::new(event)
        .with(key, id)
        .with(PERFORMED_BY_KEY, performed_by)
}

/// Entry for a created item.
pub fn build_item_creation_event_entry(item: &Item, performed_by: u64) -> AuditLogEntryCreationInput {
    entry(AuditLogEventType::ItemCreated, ITEM_ASSIGNMENT_KEY, item.id, performed_by)
        .with(ACCOUNT_ASSIGNMENT_KEY, item.belongs_to_account)
        .with(CREATION_KEY, to_value(item))
}

/// Entry for an updated item.
pub fn build_item_update_event_entry(
    performed_by: u64,
    item_id: u64,
    account_id: u64,
    changes: &[FieldChangeSummary],
) -> AuditLogEntryCreationInput {
    entry(AuditLogEventType::ItemUpdated, ITEM_ASSIGNMENT_KEY, item_id, performed_by)
        .with(ACCOUNT_ASSIGNMENT_KEY, account_id)
        .with(CHANGES_KEY, to_value(changes))
}

/// Entry for an archived item.
pub fn build_item_archive_event_entry(
    performed_by: u64,
    item_id: u64,
    account_id: u64,
) -> AuditLogEntryCreationInput {
    entry(AuditLogEventType::ItemArchived, ITEM_ASSIGNMENT_KEY, item_id, performed_by)
        .with(ACCOUNT_ASSIGNMENT_KEY, account_id)
}

/// Entry for a created webhook.
pub fn build_webhook_creation_event_entry(
    webhook: &Webhook,
    performed_by: u64,
) -> AuditLogEntryCreationInput {
    entry(AuditLogEventType::WebhookCreated, WEBHOOK_ASSIGNMENT_KEY, webhook.id, performed_by)
        .with(ACCOUNT_ASSIGNMENT_KEY, webhook.belongs_to_account)
        .with(CREATION_KEY, to_value(webhook))
}

/// Entry for an updated webhook.
pub fn build_webhook_update_event_entry(
    performed_by: u64,
    webhook_id: u64,
    account_id: u64,
    changes: &[FieldChangeSummary],
) -> AuditLogEntryCreationInput {
    entry(AuditLogEventType::WebhookUpdated, WEBHOOK_ASSIGNMENT_KEY, webhook_id, performed_by)
        .with(ACCOUNT_ASSIGNMENT_KEY, account_id)
        .with(CHANGES_KEY, to_value(changes))
}

/// Entry for an archived webhook.
pub fn build_webhook_archive_event_entry(
    performed_by: u64,
    webhook_id: u64,
    account_id: u64,
) -> AuditLogEntryCreationInput {
    entry(AuditLogEventType::WebhookArchived, WEBHOOK_ASSIGNMENT_KEY, webhook_id, performed_by)
        .with(ACCOUNT_ASSIGNMENT_KEY, account_id)
}

/// Entry for a created OAuth2 client. The secret never reaches the log.
pub fn build_oauth2_client_creation_event_entry(client: &OAuth2Client) -> AuditLogEntryCreationInput {
    entry(
        AuditLogEventType::OAuth2ClientCreated,
        OAUTH2_CLIENT_ASSIGNMENT_KEY,
        client.id,
        client.belongs_to_user,
    )
    .with(CREATION_KEY, to_value(client))
}

/// Entry for an updated OAuth2 client.
pub fn build_oauth2_client_update_event_entry(
    user_id: u64,
    client_id: u64,
    changes: &[FieldChangeSummary],
) -> AuditLogEntryCreationInput {
    entry(AuditLogEventType::OAuth2ClientUpdated, OAUTH2_CLIENT_ASSIGNMENT_KEY, client_id, user_id)
        .with(CHANGES_KEY, to_value(changes))
}

/// Entry for an archived OAuth2 client.
pub fn build_oauth2_client_archive_event_entry(user_id: u64, client_id: u64) -> AuditLogEntryCreationInput {
    entry(AuditLogEventType::OAuth2ClientArchived, OAUTH2_CLIENT_ASSIGNMENT_KEY, client_id, user_id)
}

/// Entry for a created user; users register themselves.
pub fn build_user_creation_event_entry(user: &User) -> AuditLogEntryCreationInput {
    entry(AuditLogEventType::UserCreated, USER_ASSIGNMENT_KEY, user.id, user.id)
        .with(CREATION_KEY, to_value(user))
}

/// Entry for an updated user.
pub fn build_user_update_event_entry(
    performed_by: u64,
    user_id: u64,
    changes: &[FieldChangeSummary],
) -> AuditLogEntryCreationInput {
    entry(AuditLogEventType::UserUpdated, USER_ASSIGNMENT_KEY, user_id, performed_by)
        .with(CHANGES_KEY, to_value(changes))
}

/// Entry for an archived user.
pub fn build_user_archive_event_entry(performed_by: u64, user_id: u64) -> AuditLogEntryCreationInput {
    entry(AuditLogEventType::UserArchived, USER_ASSIGNMENT_KEY, user_id, performed_by)
}

/// Entry for a created account.
pub fn build_account_creation_event_entry(account: &Account) -> AuditLogEntryCreationInput {
    entry(
        AuditLogEventType::AccountCreated,
        ACCOUNT_ASSIGNMENT_KEY,
        account.id,
        account.belongs_to_user,
    )
    .with(CREATION_KEY, to_value(account))
}

/// Entry for an updated account.
pub fn build_account_update_event_entry(
    performed_by: u64,
    account_id: u64,
    changes: &[FieldChangeSummary],
) -> AuditLogEntryCreationInput {
    entry(AuditLogEventType::AccountUpdated, ACCOUNT_ASSIGNMENT_KEY, account_id, performed_by)
        .with(CHANGES_KEY, to_value(changes))
}

/// Entry for an archived account.
pub fn build_account_archive_event_entry(performed_by: u64, account_id: u64) -> AuditLogEntryCreationInput {
    entry(AuditLogEventType::AccountArchived, ACCOUNT_ASSIGNMENT_KEY, account_id, performed_by)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_creation_snapshots_the_item() {
        let item = Item {
            id: 12,
            external_id: "ext-12".into(),
            name: "widget".into(),
            belongs_to_account: 4,
            ..Item::default()
        };
        let entry = build_item_creation_event_entry(&item, 9);
        assert_eq!(entry.event_type, AuditLogEventType::ItemCreated);
        assert_eq!(entry.context[ITEM_ASSIGNMENT_KEY], 12);
        assert_eq!(entry.context[ACCOUNT_ASSIGNMENT_KEY], 4);
        assert_eq!(entry.context[PERFORMED_BY_KEY], 9);
        assert_eq!(entry.context[CREATION_KEY]["name"], "widget");
    }

    #[test]
    fn update_carries_changes_in_order() {
        let changes = vec![
            FieldChangeSummary::new("name", "a", "b"),
            FieldChangeSummary::new("details", "c", "d"),
        ];
        let entry = build_webhook_update_event_entry(1, 2, 3, &changes);
        let recorded = entry.context[CHANGES_KEY].as_array().unwrap();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0]["fieldName"], "name");
        assert_eq!(recorded[1]["newValue"], "d");
    }

    #[test]
    fn oauth2_client_secret_stays_out_of_context() {
        let client = OAuth2Client {
            id: 5,
            client_secret: "s3cret".into(),
            belongs_to_user: 8,
            ..OAuth2Client::default()
        };
        let entry = build_oauth2_client_creation_event_entry(&client);
        assert!(!entry.context_json().contains("s3cret"));
        assert_eq!(entry.context[PERFORMED_BY_KEY], 8);
    }

    #[test]
    fn archive_entries_have_no_snapshot() {
        let entry = build_user_archive_event_entry(1, 2);
        assert!(!entry.context.contains_key(CREATION_KEY));
        assert_eq!(entry.context[USER_ASSIGNMENT_KEY], 2);
    }
}
