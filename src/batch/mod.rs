//! Bounded-concurrency batch fetching.
//!
//! [`BatchFetcher`] retrieves one record per identifier through a
//! [`RecordFetcher`] under two limits at once:
//!
//! - at most `max_concurrency` fetches are in flight at any instant
//! - after each fetch completes, the worker that ran it waits at least
//!   `min_spacing_ms` before starting its next one
//!
//! A fixed pool of workers drains a shared queue of identifiers. The workers are
//! futures polled together on the caller's task, so they interleave only at the
//! fetch call and at the spacing sleep. Queue pops and result writes never span
//! an `.await`, which is what makes each identifier fetched exactly once.
//!
//! ```rust,no_run
//! use medfetch::batch::{BatchConfig, BatchFetcher};
//! use medfetch::sources::MockFetcher;
//!
//! # async fn example() {
//! let batch = BatchFetcher::new(MockFetcher::new(), BatchConfig::new(2, 100));
//! let ids: Vec<String> = vec!["1".into(), "2".into(), "3".into()];
//! let result = batch.fetch_all(&ids).await;
//! assert_eq!(result.len(), 3);
//! # }
//! ```

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::models::{Identifier, PublicationRecord};
use crate::sources::RecordFetcher;

/// Concurrency and spacing limits for one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum fetches in flight at once (0 is treated as 1)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Minimum idle time per worker between consecutive fetches, in milliseconds
    #[serde(default = "default_min_spacing_ms")]
    pub min_spacing_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            min_spacing_ms: default_min_spacing_ms(),
        }
    }
}

fn default_max_concurrency() -> usize {
    10
}

fn default_min_spacing_ms() -> u64 {
    100
}

impl BatchConfig {
    pub fn new(max_concurrency: usize, min_spacing_ms: u64) -> Self {
        Self {
            max_concurrency,
            min_spacing_ms,
        }
    }

    /// Spacing as a [`Duration`]
    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.min_spacing_ms)
    }

    /// Number of workers to launch for `pending` identifiers
    pub fn worker_count(&self, pending: usize) -> usize {
        self.max_concurrency.max(1).min(pending)
    }
}

/// Cooperative stop signal for a running batch.
///
/// Workers check the flag before taking their next identifier. Fetches already
/// in flight run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that workers stop taking new identifiers
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Callback invoked with `(completed, total)` after every attempt
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Outcome of a batch fetch.
///
/// `records` holds one entry per successfully fetched identifier, in no
/// particular order. Failed identifiers never appear in `records`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Successfully fetched records
    pub records: Vec<PublicationRecord>,

    /// Identifiers whose fetch or parse failed
    pub failed: Vec<Identifier>,

    /// Identifiers never attempted because the batch was cancelled
    pub skipped: Vec<Identifier>,

    /// Whether the batch stopped early on cancellation
    pub cancelled: bool,
}

impl BatchResult {
    /// Number of fetched records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<PublicationRecord> {
        self.records
    }
}

/// Result slot reserved for one identifier
#[derive(Debug)]
enum Slot {
    Pending,
    Fetched(PublicationRecord),
    Failed,
}

/// State shared by the workers of one batch
struct BatchState {
    queue: Mutex<VecDeque<usize>>,
    slots: Mutex<Vec<Slot>>,
    completed: AtomicUsize,
}

impl BatchState {
    fn new(len: usize) -> Self {
        Self {
            queue: Mutex::new((0..len).collect()),
            slots: Mutex::new((0..len).map(|_| Slot::Pending).collect()),
            completed: AtomicUsize::new(0),
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<usize>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pop(&self) -> Option<usize> {
        self.queue().pop_front()
    }

    fn has_pending(&self) -> bool {
        !self.queue().is_empty()
    }

    fn store(&self, index: usize, slot: Slot) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)[index] = slot;
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Compact the slots. Workers only leave a slot pending after observing
    /// cancellation, so the batch counts as cancelled exactly when one remains.
    fn into_result(self, ids: &[Identifier]) -> BatchResult {
        let slots = self
            .slots
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        let mut result = BatchResult::default();
        for (slot, id) in slots.into_iter().zip(ids) {
            match slot {
                Slot::Fetched(record) => result.records.push(record),
                Slot::Failed => result.failed.push(id.clone()),
                Slot::Pending => result.skipped.push(id.clone()),
            }
        }
        result.cancelled = !result.skipped.is_empty();
        result
    }
}

/// Fetches many records with bounded concurrency and per-worker spacing
pub struct BatchFetcher<F> {
    fetcher: F,
    config: BatchConfig,
    cancel: Option<CancellationFlag>,
    progress: Option<ProgressCallback>,
}

impl<F: RecordFetcher> BatchFetcher<F> {
    pub fn new(fetcher: F, config: BatchConfig) -> Self {
        if config.max_concurrency == 0 {
            tracing::warn!("max_concurrency is 0, running with a single worker");
        }
        Self {
            fetcher,
            config,
            cancel: None,
            progress: None,
        }
    }

    /// Stop taking new identifiers once `flag` is cancelled
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Report `(completed, total)` after every attempt
    pub fn with_progress(
        mut self,
        callback: impl Fn(usize, usize) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationFlag::is_cancelled)
    }

    /// Fetch every identifier in `ids` once.
    ///
    /// Returns after all workers have exited, which happens when the queue is
    /// empty and no fetch is outstanding (or the batch was cancelled). A failed
    /// fetch is logged and left out of the result; it never aborts the batch.
    pub async fn fetch_all(&self, ids: &[Identifier]) -> BatchResult {
        if ids.is_empty() {
            return BatchResult::default();
        }

        let workers = self.config.worker_count(ids.len());
        let state = BatchState::new(ids.len());
        let started = Instant::now();

        tracing::debug!(
            total = ids.len(),
            workers,
            spacing_ms = self.config.min_spacing_ms,
            "Starting batch fetch"
        );

        join_all((0..workers).map(|worker| self.run_worker(worker, ids, &state))).await;

        let result = state.into_result(ids);
        tracing::info!(
            fetched = result.records.len(),
            failed = result.failed.len(),
            skipped = result.skipped.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch fetch finished"
        );
        result
    }

    async fn run_worker(&self, worker: usize, ids: &[Identifier], state: &BatchState) {
        let spacing = self.config.min_spacing();

        loop {
            if self.is_cancelled() {
                tracing::debug!(worker, "Batch cancelled, worker stopping");
                break;
            }

            let Some(index) = state.pop() else {
                break;
            };
            let id = &ids[index];

            let slot = match self.fetcher.fetch(id).await {
                Ok(record) => Slot::Fetched(record),
                Err(e) => {
                    tracing::warn!(worker, id = %id, error = %e, "Failed to fetch record");
                    Slot::Failed
                }
            };

            let completed = state.store(index, slot);
            if let Some(progress) = &self.progress {
                progress(completed, ids.len());
            }

            if !spacing.is_zero() && state.has_pending() {
                sleep(spacing).await;
            }
        }
    }
}
