//! Accounts: the tenant boundary that owns items and webhooks.

use serde::{Deserialize, Serialize};

use super::changes::{ChangeSet, FieldChangeSummary};
use super::filter::Pagination;

/// A stored account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Surrogate key.
    #[serde(skip)]
    pub id: u64,
    /// Opaque external ID.
    #[serde(rename = "id")]
    pub external_id: String,
    /// Display name.
    pub name: String,
    /// Creation time (unix seconds).
    pub created_on: u64,
    /// Last update time.
    pub last_updated_on: Option<u64>,
    /// Archive time.
    pub archived_on: Option<u64>,
    /// User that created the account.
    pub belongs_to_user: u64,
}

/// Fields a caller supplies to create an account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCreationInput {
    /// Display name.
    pub name: String,
    /// Creating user.
    #[serde(skip)]
    pub belongs_to_user: u64,
}

/// Fields a caller may change on an account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdateInput {
    /// New display name.
    pub name: String,
}

/// One page of accounts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountList {
    /// Pagination metadata.
    #[serde(flatten)]
    pub pagination: Pagination,
    /// The page.
    pub accounts: Vec<Account>,
}

impl Account {
    /// Merge an update input, returning what changed.
    pub fn update(&mut self, input: &AccountUpdateInput) -> Vec<FieldChangeSummary> {
        let mut changes = ChangeSet::default();
        changes.string("name", &mut self.name, &input.name);
        changes.finish()
    }
}
