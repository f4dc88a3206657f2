//! # keeper-core
//!
//! Domain vocabulary for the keeper data-access engine.
//!
//! This crate provides the types every layer above the database shares:
//!
//! - **Entities**: `Item`, `Webhook`, `OAuth2Client`, `User`, `Account`, each with
//!   a numeric surrogate key, an opaque external ID, and unix-epoch timestamps
//! - **Inputs**: creation/update inputs and `FieldChangeSummary` diffs
//! - **Pagination**: `QueryFilter` and the `Pagination` block attached to lists
//! - **Audit log**: `AuditLogEntry`, the closed `AuditLogEventType` set, and the
//!   entry builders in [`audit`]
//! - **Logging**: `tracing` subscriber setup and in-memory capture for tests

#![deny(unsafe_code)]

pub mod audit;
pub mod delimited;
pub mod ids;
pub mod logging;
pub mod types;

pub use types::*;
