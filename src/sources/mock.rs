//! Mock search and fetch implementations for testing purposes.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::models::{AffiliationQuery, Identifier, PublicationBuilder, PublicationRecord};
use crate::sources::{FetchError, IdentifierSearch, RecordFetcher, SearchError};

/// A scripted fetcher that records how it was called.
///
/// Every identifier succeeds with a generated record unless it was registered
/// with [`fail_on`](MockFetcher::fail_on) or given a canned record. Each call
/// sleeps for the configured latency so overlapping calls can be observed.
#[derive(Debug, Default)]
pub struct MockFetcher {
    latency: Duration,
    records: HashMap<Identifier, PublicationRecord>,
    failures: HashSet<Identifier>,
    calls: Mutex<Vec<(Identifier, Instant)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockFetcher {
    /// Create a new mock fetcher with no latency.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every fetch.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the given identifier with `RequestFailed`.
    pub fn fail_on(mut self, id: impl Into<Identifier>) -> Self {
        self.failures.insert(id.into());
        self
    }

    /// Return `record` for its own `pmid`.
    pub fn with_record(mut self, record: PublicationRecord) -> Self {
        self.records.insert(record.pmid.clone(), record);
        self
    }

    /// Total number of fetch calls.
    pub fn call_count(&self) -> usize {
        self.lock_calls().len()
    }

    /// Identifiers in the order their fetches started.
    pub fn called_ids(&self) -> Vec<Identifier> {
        self.lock_calls().iter().map(|(id, _)| id.clone()).collect()
    }

    /// `(identifier, start instant)` for every call, in start order.
    pub fn call_log(&self) -> Vec<(Identifier, Instant)> {
        self.lock_calls().clone()
    }

    /// Highest number of fetches observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<(Identifier, Instant)>> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordFetcher for MockFetcher {
    async fn fetch(&self, id: &str) -> Result<PublicationRecord, FetchError> {
        self.lock_calls().push((id.to_string(), Instant::now()));
        let depth = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(depth, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failures.contains(id) {
            return Err(FetchError::RequestFailed(format!("mock failure for {}", id)));
        }

        Ok(self
            .records
            .get(id)
            .cloned()
            .unwrap_or_else(|| make_record(id, "Mock University")))
    }
}

/// A search that returns a fixed identifier list or a fixed error.
#[derive(Debug, Default)]
pub struct MockSearch {
    ids: Vec<Identifier>,
    error: Option<String>,
    calls: AtomicUsize,
}

impl MockSearch {
    /// Create a search that returns `ids`.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Identifier>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Create a search that fails with a network error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Number of search calls made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentifierSearch for MockSearch {
    async fn search_ids(&self, _query: &AffiliationQuery) -> Result<Vec<Identifier>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(message) => Err(SearchError::Network(message.clone())),
            None => Ok(self.ids.clone()),
        }
    }
}

/// Helper function to create a one-author record for testing.
pub fn make_record(pmid: &str, affiliation: &str) -> PublicationRecord {
    PublicationBuilder::new(pmid)
        .title(format!("Publication {}", pmid))
        .journal("Journal of Testing")
        .author(format!("Author {}", pmid), affiliation)
        .build()
}
