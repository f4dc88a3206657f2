//! Users: service principals. Users are not tenant-scoped.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ParseEnumError;
use super::changes::{ChangeSet, FieldChangeSummary};
use super::filter::Pagination;

/// Standing of a user's account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserReputation {
    /// In good standing.
    Good,
    /// Two-factor secret not yet verified.
    #[default]
    Unverified,
    /// Banned by an administrator.
    Banned,
    /// Terminated at the user's request.
    Terminated,
}

impl UserReputation {
    /// Stored string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Unverified => "unverified",
            Self::Banned => "banned",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for UserReputation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserReputation {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "good" => Ok(Self::Good),
            "unverified" => Ok(Self::Unverified),
            "banned" => Ok(Self::Banned),
            "terminated" => Ok(Self::Terminated),
            other => Err(ParseEnumError::new("user reputation", other)),
        }
    }
}

/// A stored user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Surrogate key.
    #[serde(skip)]
    pub id: u64,
    /// Opaque external ID.
    #[serde(rename = "id")]
    pub external_id: String,
    /// Unique username.
    pub username: String,
    /// Avatar image source.
    pub avatar_src: Option<String>,
    /// Password hash (hashing happens above this layer).
    #[serde(skip)]
    pub hashed_password: String,
    /// Whether the user must change password at next login.
    pub requires_password_change: bool,
    /// When the password was last changed.
    pub password_last_changed_on: Option<u64>,
    /// Two-factor secret.
    #[serde(skip)]
    pub two_factor_secret: String,
    /// When the two-factor secret was verified.
    #[serde(skip)]
    pub two_factor_secret_verified_on: Option<u64>,
    /// Service-wide roles.
    pub service_roles: Vec<String>,
    /// Account standing.
    pub reputation: UserReputation,
    /// Why the standing was set.
    pub reputation_explanation: String,
    /// Creation time (unix seconds).
    pub created_on: u64,
    /// Last update time.
    pub last_updated_on: Option<u64>,
    /// Archive time.
    pub archived_on: Option<u64>,
}

/// Fields the registration flow supplies to store a user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreationInput {
    /// Unique username.
    pub username: String,
    /// Password hash.
    pub hashed_password: String,
    /// Two-factor secret.
    pub two_factor_secret: String,
    /// Service-wide roles.
    pub service_roles: Vec<String>,
}

/// Fields a caller may change on a user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdateInput {
    /// New username.
    pub username: String,
    /// New avatar source.
    pub avatar_src: Option<String>,
}

/// One page of users.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserList {
    /// Pagination metadata.
    #[serde(flatten)]
    pub pagination: Pagination,
    /// The page.
    pub users: Vec<User>,
}

/// Test user created during migration when configured.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestUserCreationConfig {
    /// Username.
    pub username: String,
    /// Password hash to store.
    pub hashed_password: String,
    /// Grant the `service_admin` role.
    pub is_service_admin: bool,
}

/// Role granted to every user.
pub const SERVICE_USER_ROLE: &str = "service_user";
/// Role granted to administrators.
pub const SERVICE_ADMIN_ROLE: &str = "service_admin";

impl User {
    /// Merge an update input, returning what changed.
    pub fn update(&mut self, input: &UserUpdateInput) -> Vec<FieldChangeSummary> {
        let mut changes = ChangeSet::default();
        changes.string("username", &mut self.username, &input.username);
        changes.optional("avatar", &mut self.avatar_src, input.avatar_src.as_deref());
        changes.finish()
    }

    /// Whether the user holds the admin role.
    pub fn is_service_admin(&self) -> bool {
        self.service_roles.iter().any(|r| r == SERVICE_ADMIN_ROLE)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
