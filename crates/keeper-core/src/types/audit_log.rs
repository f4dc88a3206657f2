//! Audit log entries: the immutable record written alongside every mutation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ParseEnumError;
use super::filter::Pagination;

/// Context blob attached to an entry.
pub type AuditLogContext = Map<String, Value>;

macro_rules! event_types {
    ($($variant:ident => $text:literal),+ $(,)?) => {
        /// Closed set of state changes the audit log records.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum AuditLogEventType {
            $(
                #[doc = concat!("`", $text, "`")]
                $variant,
            )+
        }

        impl AuditLogEventType {
            /// Every event type, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Stored string form.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl FromStr for AuditLogEventType {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseEnumError::new("audit log event type", other)),
                }
            }
        }
    };
}

event_types! {
    ItemCreated => "item_created",
    ItemUpdated => "item_updated",
    ItemArchived => "item_archived",
    WebhookCreated => "webhook_created",
    WebhookUpdated => "webhook_updated",
    WebhookArchived => "webhook_archived",
    OAuth2ClientCreated => "oauth2_client_created",
    OAuth2ClientUpdated => "oauth2_client_updated",
    OAuth2ClientArchived => "oauth2_client_archived",
    UserCreated => "user_created",
    UserUpdated => "user_updated",
    UserArchived => "user_archived",
    AccountCreated => "account_created",
    AccountUpdated => "account_updated",
    AccountArchived => "account_archived",
}

impl fmt::Display for AuditLogEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored audit log entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    /// Surrogate key.
    #[serde(skip)]
    pub id: u64,
    /// Opaque external ID.
    #[serde(rename = "id")]
    pub external_id: String,
    /// What happened.
    pub event_type: AuditLogEventType,
    /// Who did it and what changed.
    pub context: AuditLogContext,
    /// Creation time (unix seconds).
    pub created_on: u64,
}

/// An entry waiting to be written inside a mutation's transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntryCreationInput {
    /// What happened.
    pub event_type: AuditLogEventType,
    /// Who did it and what changed.
    pub context: AuditLogContext,
}

impl AuditLogEntryCreationInput {
    /// Start an entry with an empty context.
    pub fn new(event_type: AuditLogEventType) -> Self {
        Self {
            event_type,
            context: AuditLogContext::new(),
        }
    }

    /// Add a context key.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        let _ = self.context.insert(key.to_owned(), value.into());
        self
    }

    /// Context serialized for storage.
    pub fn context_json(&self) -> String {
        Value::Object(self.context.clone()).to_string()
    }
}

/// One page of audit log entries.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntryList {
    /// Pagination metadata.
    #[serde(flatten)]
    pub pagination: Pagination,
    /// The page.
    pub entries: Vec<AuditLogEntry>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_event_type_parses_its_own_string() {
        for event in AuditLogEventType::ALL {
            assert_eq!(event.as_str().parse::<AuditLogEventType>().unwrap(), *event);
        }
        assert_eq!(AuditLogEventType::ALL.len(), 15);
    }

    #[test]
    fn serde_matches_stored_form() {
        let json = serde_json::to_string(&AuditLogEventType::OAuth2ClientArchived).unwrap();
        assert_eq!(json, "\"oauth2_client_archived\"");
    }

    #[test]
    fn unknown_event_type_is_an_error() {
        let err = "item_deleted".parse::<AuditLogEventType>().unwrap_err();
        assert_eq!(err.value, "item_deleted");
    }

    #[test]
    fn context_json_is_an_object() {
        let entry = AuditLogEntryCreationInput::new(AuditLogEventType::ItemCreated)
            .with("item_id", 7)
            .with("performed_by", 3);
        let parsed: Value = serde_json::from_str(&entry.context_json()).unwrap();
        assert_eq!(parsed["item_id"], 7);
        assert_eq!(parsed["performed_by"], 3);
    }
}
