//! List filtering and pagination metadata.

use serde::{Deserialize, Serialize};

/// Page used when a filter does not name one.
pub const DEFAULT_PAGE: u64 = 1;
/// Page size used when a filter does not name one.
pub const DEFAULT_LIMIT: u8 = 20;
/// Largest page size a list query will honour.
pub const MAX_LIMIT: u8 = 250;

/// Ordering applied to the surrogate key of listed rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first.
    #[default]
    Asc,
    /// Newest first.
    Desc,
}

impl SortOrder {
    /// SQL keyword for this ordering.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Caller-supplied constraints for a list operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryFilter {
    /// 1-based page number.
    pub page: u64,
    /// Page size.
    pub limit: u8,
    /// Only rows created strictly after this time.
    pub created_after: Option<u64>,
    /// Only rows created strictly before this time.
    pub created_before: Option<u64>,
    /// Only rows updated strictly after this time.
    pub updated_after: Option<u64>,
    /// Only rows updated strictly before this time.
    pub updated_before: Option<u64>,
    /// Include archived rows.
    pub include_archived: bool,
    /// Ordering by surrogate key.
    pub sort_by: SortOrder,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            created_after: None,
            created_before: None,
            updated_after: None,
            updated_before: None,
            include_archived: false,
            sort_by: SortOrder::Asc,
        }
    }
}

impl QueryFilter {
    /// Filter for one page of the given size.
    pub fn new(page: u64, limit: u8) -> Self {
        Self {
            page,
            limit,
            ..Self::default()
        }
    }

    /// Page size actually used in SQL: zero becomes the default, oversized
    /// values are capped.
    pub fn effective_limit(&self) -> u8 {
        match self.limit {
            0 => DEFAULT_LIMIT,
            n => n.min(MAX_LIMIT),
        }
    }

    /// Row offset of the first row on this page.
    pub fn offset(&self) -> u64 {
        self.page.max(1).saturating_sub(1) * u64::from(self.effective_limit())
    }
}

/// Pagination block reported alongside every list.
///
/// `page` and `limit` echo the caller's filter exactly; both are zero when no
/// filter was supplied, which signals an unfiltered listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Requested page, or 0.
    pub page: u64,
    /// Requested page size, or 0.
    pub limit: u8,
    /// Rows matching the filter.
    pub filtered_count: u64,
    /// Rows visible to the owner regardless of filter.
    pub total_count: u64,
}

impl Pagination {
    /// Echo the filter's page and limit, or zeros when absent.
    pub fn for_filter(filter: Option<&QueryFilter>) -> Self {
        filter.map_or_else(Self::default, |f| Self {
            page: f.page,
            limit: f.limit,
            ..Self::default()
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_filter_reports_zero() {
        let p = Pagination::for_filter(None);
        assert_eq!((p.page, p.limit), (0, 0));
    }

    #[test]
    fn present_filter_is_echoed() {
        let f = QueryFilter::new(2, 10);
        let p = Pagination::for_filter(Some(&f));
        assert_eq!((p.page, p.limit), (2, 10));
    }

    #[test]
    fn offset_math() {
        assert_eq!(QueryFilter::new(1, 10).offset(), 0);
        assert_eq!(QueryFilter::new(3, 10).offset(), 20);
        assert_eq!(QueryFilter::new(0, 10).offset(), 0);
    }

    #[test]
    fn limit_is_defaulted_and_capped() {
        assert_eq!(QueryFilter::new(1, 0).effective_limit(), DEFAULT_LIMIT);
        assert_eq!(QueryFilter::new(1, 255).effective_limit(), MAX_LIMIT);
    }

    #[test]
    fn deserializes_partial_json() {
        let f: QueryFilter = serde_json::from_str(r#"{"page": 4, "sortBy": "desc"}"#).unwrap();
        assert_eq!(f.page, 4);
        assert_eq!(f.limit, DEFAULT_LIMIT);
        assert_eq!(f.sort_by, SortOrder::Desc);
    }
}
