//! Entity, input and list types.

mod account;
mod audit_log;
mod changes;
mod filter;
mod item;
mod oauth2_client;
mod user;
mod webhook;

pub use account::{Account, AccountCreationInput, AccountList, AccountUpdateInput};
pub use audit_log::{
    AuditLogContext, AuditLogEntry, AuditLogEntryCreationInput, AuditLogEntryList,
    AuditLogEventType,
};
pub use changes::FieldChangeSummary;
pub use filter::{DEFAULT_LIMIT, DEFAULT_PAGE, MAX_LIMIT, Pagination, QueryFilter, SortOrder};
pub use item::{Item, ItemCreationInput, ItemList, ItemUpdateInput};
pub use oauth2_client::{
    OAuth2Client, OAuth2ClientCreationInput, OAuth2ClientList, OAuth2ClientUpdateInput,
};
pub use user::{
    SERVICE_ADMIN_ROLE, SERVICE_USER_ROLE, TestUserCreationConfig, User, UserCreationInput,
    UserList, UserReputation, UserUpdateInput,
};
pub use webhook::{Webhook, WebhookCreationInput, WebhookList, WebhookUpdateInput};

/// A stored string that names no variant of a closed enumeration.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    /// Which enumeration was being parsed.
    pub kind: &'static str,
    /// The offending text.
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}
