//! OAuth2 clients: delegated credentials owned by a user.

use serde::{Deserialize, Serialize};

use super::changes::{ChangeSet, FieldChangeSummary};
use super::filter::Pagination;

/// A stored OAuth2 client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Client {
    /// Surrogate key.
    #[serde(skip)]
    pub id: u64,
    /// Opaque external ID.
    #[serde(rename = "id")]
    pub external_id: String,
    /// Display name.
    pub name: String,
    /// Public client identifier.
    pub client_id: String,
    /// Client secret.
    #[serde(skip_serializing)]
    pub client_secret: String,
    /// Redirect URI.
    pub redirect_uri: String,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// Creation time (unix seconds).
    pub created_on: u64,
    /// Last update time.
    pub last_updated_on: Option<u64>,
    /// Archive time.
    pub archived_on: Option<u64>,
    /// Owning user.
    pub belongs_to_user: u64,
}

/// Fields a caller supplies to create an OAuth2 client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2ClientCreationInput {
    /// Display name.
    pub name: String,
    /// Public client identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Redirect URI.
    pub redirect_uri: String,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// Owning user.
    #[serde(skip)]
    pub belongs_to_user: u64,
}

/// Fields a caller may change on an OAuth2 client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2ClientUpdateInput {
    /// Display name.
    pub name: String,
    /// Redirect URI.
    pub redirect_uri: String,
    /// Granted scopes.
    pub scopes: Vec<String>,
}

/// One page of OAuth2 clients.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2ClientList {
    /// Pagination metadata.
    #[serde(flatten)]
    pub pagination: Pagination,
    /// The page.
    pub clients: Vec<OAuth2Client>,
}

impl OAuth2Client {
    /// Merge an update input, returning what changed.
    pub fn update(&mut self, input: &OAuth2ClientUpdateInput) -> Vec<FieldChangeSummary> {
        let mut changes = ChangeSet::default();
        changes.string("name", &mut self.name, &input.name);
        changes.string("redirectURI", &mut self.redirect_uri, &input.redirect_uri);
        changes.list("scopes", &mut self.scopes, &input.scopes);
        changes.finish()
    }

    /// Whether the client was granted `scope`, or the `*` wildcard.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope || s == "*")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
