//! Delimited list columns.
//!
//! A few entity fields (webhook events, OAuth2 scopes, user roles) are stored
//! as a single text column joined by a separator. An empty column decodes to
//! an empty list, never to `[""]`.

/// Separator used by every delimited list column.
pub const LIST_SEPARATOR: &str = ",";

/// Split a stored list column back into its ordered elements.
pub fn split_delimited(raw: &str, separator: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(separator).map(str::to_owned).collect()
}

/// Join list elements into their stored form.
pub fn join_delimited<S: AsRef<str>>(values: &[S], separator: &str) -> String {
    values
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(separator)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_string_is_empty_list() {
        assert!(split_delimited("", LIST_SEPARATOR).is_empty());
    }

    #[test]
    fn single_value() {
        assert_eq!(split_delimited("things", LIST_SEPARATOR), vec!["things"]);
    }

    #[test]
    fn preserves_order() {
        assert_eq!(
            split_delimited("create,update,archive", LIST_SEPARATOR),
            vec!["create", "update", "archive"]
        );
    }

    #[test]
    fn join_empty_is_empty_string() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(join_delimited(&empty, LIST_SEPARATOR), "");
    }

    proptest! {
        #[test]
        fn split_inverts_join(values in prop::collection::vec("[a-z_.]{1,12}", 0..8)) {
            let joined = join_delimited(&values, LIST_SEPARATOR);
            prop_assert_eq!(split_delimited(&joined, LIST_SEPARATOR), values);
        }
    }
}
