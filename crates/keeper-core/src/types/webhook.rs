//! Webhooks: outbound HTTP listeners registered by an account.

use serde::{Deserialize, Serialize};

use super::changes::{ChangeSet, FieldChangeSummary};
use super::filter::Pagination;

/// A stored webhook.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    /// Surrogate key.
    #[serde(skip)]
    pub id: u64,
    /// Opaque external ID.
    #[serde(rename = "id")]
    pub external_id: String,
    /// Display name.
    pub name: String,
    /// Content type of delivered payloads.
    pub content_type: String,
    /// Delivery URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// Event names the webhook listens for.
    pub events: Vec<String>,
    /// Data types the webhook listens for.
    pub data_types: Vec<String>,
    /// Topics the webhook listens for.
    pub topics: Vec<String>,
    /// Creation time (unix seconds).
    pub created_on: u64,
    /// Last update time.
    pub last_updated_on: Option<u64>,
    /// Archive time.
    pub archived_on: Option<u64>,
    /// Owning account.
    pub belongs_to_account: u64,
}

/// Fields a caller supplies to create a webhook.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookCreationInput {
    /// Display name.
    pub name: String,
    /// Content type.
    pub content_type: String,
    /// Delivery URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// Event names.
    pub events: Vec<String>,
    /// Data types.
    pub data_types: Vec<String>,
    /// Topics.
    pub topics: Vec<String>,
    /// Owning account.
    #[serde(skip)]
    pub belongs_to_account: u64,
}

/// Fields a caller may change on a webhook. Empty values leave a field alone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookUpdateInput {
    /// Display name.
    pub name: String,
    /// Content type.
    pub content_type: String,
    /// Delivery URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// Event names.
    pub events: Vec<String>,
    /// Data types.
    pub data_types: Vec<String>,
    /// Topics.
    pub topics: Vec<String>,
}

/// One page of webhooks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookList {
    /// Pagination metadata.
    #[serde(flatten)]
    pub pagination: Pagination,
    /// The page.
    pub webhooks: Vec<Webhook>,
}

impl Webhook {
    /// Merge an update input, returning what changed.
    pub fn update(&mut self, input: &WebhookUpdateInput) -> Vec<FieldChangeSummary> {
        let mut changes = ChangeSet::default();
        changes.string("name", &mut self.name, &input.name);
        changes.string("contentType", &mut self.content_type, &input.content_type);
        changes.string("url", &mut self.url, &input.url);
        changes.string("method", &mut self.method, &input.method);
        changes.list("events", &mut self.events, &input.events);
        changes.list("dataTypes", &mut self.data_types, &input.data_types);
        changes.list("topics", &mut self.topics, &input.topics);
        changes.finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_replaces_lists_wholesale() {
        let mut webhook = Webhook {
            events: vec!["item_created".into()],
            topics: vec!["items".into()],
            ..Webhook::default()
        };
        let changes = webhook.update(&WebhookUpdateInput {
            events: vec!["item_created".into(), "item_archived".into()],
            ..WebhookUpdateInput::default()
        });
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field_name, "events");
        assert_eq!(webhook.events.len(), 2);
        assert_eq!(webhook.topics, vec!["items"]);
    }
}
