//! Items: the basic tenant-owned record.

use serde::{Deserialize, Serialize};

use super::changes::{ChangeSet, FieldChangeSummary};
use super::filter::Pagination;

/// A stored item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Surrogate key.
    #[serde(skip)]
    pub id: u64,
    /// Opaque external ID.
    #[serde(rename = "id")]
    pub external_id: String,
    /// Display name.
    pub name: String,
    /// Free-form details.
    pub details: String,
    /// Creation time (unix seconds).
    pub created_on: u64,
    /// Last update time, if ever updated.
    pub last_updated_on: Option<u64>,
    /// Archive time; once set it is never cleared.
    pub archived_on: Option<u64>,
    /// Owning account.
    pub belongs_to_account: u64,
}

/// Fields a caller supplies to create an item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCreationInput {
    /// Display name.
    pub name: String,
    /// Free-form details.
    pub details: String,
    /// Owning account.
    #[serde(skip)]
    pub belongs_to_account: u64,
}

/// Fields a caller may change on an item. Empty strings leave a field alone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemUpdateInput {
    /// New display name.
    pub name: String,
    /// New details.
    pub details: String,
}

/// One page of items.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemList {
    /// Pagination metadata.
    #[serde(flatten)]
    pub pagination: Pagination,
    /// The page.
    pub items: Vec<Item>,
}

impl Item {
    /// Merge an update input, returning what changed.
    pub fn update(&mut self, input: &ItemUpdateInput) -> Vec<FieldChangeSummary> {
        let mut changes = ChangeSet::default();
        changes.string("name", &mut self.name, &input.name);
        changes.string("details", &mut self.details, &input.details);
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
    fn update_reports_changed_fields_only() {
        let mut item = Item {
            name: "old".into(),
            details: "same".into(),
            ..Item::default()
        };
        let changes = item.update(&ItemUpdateInput {
            name: "new".into(),
            details: "same".into(),
        });
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field_name, "name");
        assert_eq!(changes[0].old_value, "old");
        assert_eq!(changes[0].new_value, "new");
        assert_eq!(item.name, "new");
    }

    #[test]
    fn empty_input_changes_nothing() {
        let mut item = Item {
            name: "keep".into(),
            ..Item::default()
        };
        assert!(item.update(&ItemUpdateInput::default()).is_empty());
        assert_eq!(item.name, "keep");
    }

    #[test]
    fn surrogate_key_not_serialized() {
        let item = Item {
            id: 42,
            external_id: "ext".into(),
            ..Item::default()
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], "ext");
    }
}
