//! Full-table export in concurrent id windows.
//!
//! [`stream_all`] splits `[1, total]` into windows of `batch_size` ids and
//! spawns one task per window. It returns as soon as the tasks are launched.
//! Batches arrive on the delivery channel in no particular order, and the
//! channel closes once every task has finished.
//!
//! The export is best effort. A failed window is logged, reported on the
//! optional failure channel, and otherwise dropped; siblings carry on. Since
//! ids can be sparse (archived rows, rolled-back inserts), a short stream is a
//! normal outcome.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::errors::{Result, StoreError};

/// Half-open id range `[begin, end)` fetched as one batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchWindow {
    /// First id in the window.
    pub begin: u64,
    /// One past the last id in the window.
    pub end: u64,
}

/// A window whose fetch failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowFailure {
    /// The window.
    pub window: BatchWindow,
    /// Rendered error.
    pub message: String,
}

/// Window width and task concurrency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamOptions {
    /// Ids per window; must be non-zero.
    pub batch_size: u64,
    /// Windows fetched at once.
    pub concurrency: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            concurrency: 8,
        }
    }
}

/// Where a stream's output goes.
#[derive(Debug)]
pub struct Delivery<T> {
    /// Decoded batches.
    pub batches: mpsc::Sender<Vec<T>>,
    /// Failed windows, if the caller wants to know.
    pub failures: Option<mpsc::UnboundedSender<WindowFailure>>,
}

impl<T> Delivery<T> {
    /// Also report failed windows on `failures`.
    #[must_use]
    pub fn with_failures(mut self, failures: mpsc::UnboundedSender<WindowFailure>) -> Self {
        self.failures = Some(failures);
        self
    }
}

impl<T> From<mpsc::Sender<Vec<T>>> for Delivery<T> {
    fn from(batches: mpsc::Sender<Vec<T>>) -> Self {
        Self { batches, failures: None }
    }
}

/// Windows covering ids `1..=total`.
pub fn batch_windows(total: u64, batch_size: u64) -> Result<Vec<BatchWindow>> {
    if batch_size == 0 {
        return Err(StoreError::InvalidInput("batch size must be non-zero".into()));
    }
    Ok((0..total.div_ceil(batch_size))
        .map(|i| {
            let begin = i.saturating_mul(batch_size).saturating_add(1);
            BatchWindow {
                begin,
                end: begin.saturating_add(batch_size),
            }
        })
        .collect())
}

/// Launch one fetch task per window and return without waiting for them.
///
/// `fetch` runs on the blocking pool. Each task holds a child of `cancel`;
/// a cancelled task skips its fetch or drops its batch, but a fetch already
/// running is left to finish.
pub fn stream_all<T, F>(
    cancel: &CancellationToken,
    total: u64,
    options: StreamOptions,
    delivery: Delivery<T>,
    fetch: F,
) -> Result<()>
where
    T: Send + 'static,
    F: Fn(BatchWindow) -> Result<Vec<T>> + Send + Sync + 'static,
{
    if cancel.is_cancelled() {
        return Err(StoreError::Cancelled);
    }
    let windows = batch_windows(total, options.batch_size)?;
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| StoreError::Internal(format!("stream_all needs a tokio runtime: {e}")))?;

    debug!(total, batch_size = options.batch_size, windows = windows.len(), "launching batch fetches");

    let fetch = Arc::new(fetch);
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    for window in windows {
        let task = WindowTask {
            window,
            fetch: Arc::clone(&fetch),
            semaphore: Arc::clone(&semaphore),
            batches: delivery.batches.clone(),
            failures: delivery.failures.clone(),
            cancel: cancel.child_token(),
        };
        drop(runtime.spawn(task.run()));
    }
    Ok(())
}

struct WindowTask<T, F> {
    window: BatchWindow,
    fetch: Arc<F>,
    semaphore: Arc<Semaphore>,
    batches: mpsc::Sender<Vec<T>>,
    failures: Option<mpsc::UnboundedSender<WindowFailure>>,
    cancel: CancellationToken,
}

impl<T, F> WindowTask<T, F>
where
    T: Send + 'static,
    F: Fn(BatchWindow) -> Result<Vec<T>> + Send + Sync + 'static,
{
    async fn run(self) {
        let BatchWindow { begin, end } = self.window;

        let permit = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!(begin, end, "window cancelled before fetch");
                return;
            }
            permit = Arc::clone(&self.semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return,
            },
        };

        let fetch = Arc::clone(&self.fetch);
        let window = self.window;
        let fetched = tokio::task::spawn_blocking(move || fetch(window))
            .await
            .unwrap_or_else(|e| Err(StoreError::Internal(format!("batch fetch task failed: {e}"))));
        drop(permit);

        match fetched {
            Ok(batch) if batch.is_empty() => debug!(begin, end, "no rows in window"),
            Err(e) if e.is_not_found() => debug!(begin, end, "no rows in window"),
            Ok(batch) => {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => debug!(begin, end, "window cancelled before delivery"),
                    sent = self.batches.send(batch) => if sent.is_err() {
                        debug!(begin, end, "delivery closed, dropping batch");
                    },
                }
            }
            Err(e) => {
                error!(begin, end, error = %e, "fetching batch failed");
                if let Some(failures) = &self.failures {
                    let _ = failures.send(WindowFailure {
                        window: self.window,
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
