//! Field-level diffs recorded with update audit entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One changed field: its name plus the before and after values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChangeSummary {
    /// Field name as exposed by the API.
    pub field_name: String,
    /// Value before the update.
    pub old_value: Value,
    /// Value after the update.
    pub new_value: Value,
}

impl FieldChangeSummary {
    /// Build a summary from any two serializable values.
    pub fn new(field_name: &str, old_value: impl Serialize, new_value: impl Serialize) -> Self {
        Self {
            field_name: field_name.to_owned(),
            old_value: serde_json::to_value(old_value).unwrap_or(Value::Null),
            new_value: serde_json::to_value(new_value).unwrap_or(Value::Null),
        }
    }
}

/// Collects changes while an update input is merged into an entity.
#[derive(Debug, Default)]
pub(crate) struct ChangeSet(Vec<FieldChangeSummary>);

impl ChangeSet {
    /// Replace `target` with `value` when `value` is non-empty, recording the change.
    pub(crate) fn string(&mut self, field: &str, target: &mut String, value: &str) {
        if !value.is_empty() && value != target {
            self.0.push(FieldChangeSummary::new(field, &*target, value));
            value.clone_into(target);
        }
    }

    /// Replace `target` with `values` when `values` is non-empty, recording the change.
    pub(crate) fn list(&mut self, field: &str, target: &mut Vec<String>, values: &[String]) {
        if !values.is_empty() && values != target.as_slice() {
            self.0.push(FieldChangeSummary::new(field, &*target, values));
            *target = values.to_vec();
        }
    }

    /// Replace `target` when `value` is `Some` and differs, recording the change.
    pub(crate) fn optional(&mut self, field: &str, target: &mut Option<String>, value: Option<&str>) {
        if let Some(value) = value {
            if target.as_deref() != Some(value) {
                self.0.push(FieldChangeSummary::new(field, &*target, value));
                *target = Some(value.to_owned());
            }
        }
    }

    pub(crate) fn finish(self) -> Vec<FieldChangeSummary> {
        self.0
    }
}
