//! `tracing` subscriber setup.
//!
//! The engine only emits events; binaries decide where they go. Tests use
//! [`capture`] to assert on what a querier operation logged.

pub mod capture;

pub use capture::{CapturedEvent, LogCapture, capture_logs};

/// Level used when neither `RUST_LOG` nor settings name one.
pub const DEFAULT_LEVEL: &str = "info";

/// Install a compact stderr subscriber filtered by `RUST_LOG`, falling back to
/// `level`. Later calls are no-ops.
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// Level to run at: `debug` when database debugging is on, else `configured`.
pub fn effective_level(configured: &str, debug: bool) -> &str {
    if debug { "debug" } else { configured }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
