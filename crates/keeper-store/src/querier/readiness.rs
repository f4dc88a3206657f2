//! Startup connectivity gate.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{Result, StoreError};
use crate::sqlite::ConnectionPool;

/// Pause between failed probes.
pub const PING_INTERVAL: Duration = Duration::from_secs(1);

/// Something that can tell whether the database answers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Issue one lightweight round trip.
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
impl ConnectivityProbe for ConnectionPool {
    async fn ping(&self) -> Result<()> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get()?;
            let _: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Internal(format!("ping task failed: {e}")))?
    }
}

/// Probe until it succeeds or `max_attempts` probes have failed.
///
/// Sleeps [`interval`](PING_INTERVAL) between attempts, never after the
/// last one. Returns false on exhaustion or cancellation.
pub async fn wait_until_ready(
    cancel: &CancellationToken,
    probe: &dyn ConnectivityProbe,
    max_attempts: u32,
    interval: Duration,
) -> bool {
    for attempt_count in 1..=max_attempts {
        match probe.ping().await {
            Ok(()) => return true,
            Err(e) => debug!(attempt_count, max_attempts, ?interval, error = %e, "database not ready"),
        }
        if attempt_count == max_attempts {
            break;
        }
        tokio::select! {
            () = time::sleep(interval) => {}
            () = cancel.cancelled() => return false,
        }
    }
    false
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
