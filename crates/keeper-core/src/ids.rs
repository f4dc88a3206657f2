//! Identifier helpers.
//!
//! Every entity carries two identifiers: the numeric surrogate key assigned by
//! the database, and an external ID assigned here at creation time. Only the
//! external ID should ever leave the service, so sequential keys never leak.
//!
//! A surrogate key of `0` is the reserved "absent" sentinel.

use uuid::Uuid;

/// Surrogate key value that means "no identifier supplied".
pub const ABSENT_ID: u64 = 0;

/// Generate a new external ID (UUID v7, time-ordered).
#[must_use]
pub fn new_external_id() -> String {
    Uuid::now_v7().to_string()
}

/// Whether a surrogate key is the absent sentinel.
#[must_use]
pub const fn is_absent(id: u64) -> bool {
    id == ABSENT_ID
}

/// Current wall-clock time as unix-epoch seconds.
#[must_use]
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
