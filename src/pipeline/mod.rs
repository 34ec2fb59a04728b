//! Search, fetch and filter for one affiliation query.

use serde::Serialize;

use crate::batch::{BatchFetcher, BatchResult};
use crate::matcher::AffiliationMatcher;
use crate::models::{AffiliationQuery, MatchedPublication};
use crate::sources::{IdentifierSearch, RecordFetcher, SearchError};

/// Result of a completed affiliation search.
///
/// The two empty states are valid outcomes, not errors, and are reported
/// with different messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// The search returned no identifiers
    NoResults,

    /// Records were fetched but no author's affiliation matched
    NoAffiliationMatch {
        /// Number of identifiers the search returned
        found: usize,
        /// Number of records fetched successfully
        fetched: usize,
    },

    /// At least one record matched
    Matches {
        /// Number of identifiers the search returned
        found: usize,
        publications: Vec<MatchedPublication>,
    },
}

impl SearchOutcome {
    /// Matched publications (empty for the no-result states)
    pub fn publications(&self) -> &[MatchedPublication] {
        match self {
            SearchOutcome::Matches { publications, .. } => publications,
            _ => &[],
        }
    }
}

/// Filter a fetched batch against `affiliation`
pub fn match_batch(affiliation: &str, found: usize, batch: BatchResult) -> SearchOutcome {
    let fetched = batch.len();
    let publications = AffiliationMatcher::new(affiliation).filter(batch.into_records());

    if publications.is_empty() {
        SearchOutcome::NoAffiliationMatch { found, fetched }
    } else {
        SearchOutcome::Matches {
            found,
            publications,
        }
    }
}

/// Progress of [`search_affiliation_with`] between its steps
#[derive(Debug)]
pub enum SearchEvent<'a> {
    /// The search returned this many identifiers and fetching is about to start
    Found(usize),
    /// Every identifier was attempted (or the batch was cancelled)
    Fetched(&'a BatchResult),
}

/// Run one affiliation search end to end.
///
/// Only a failure of the search call is returned as an error; individual
/// fetch failures are absorbed by the batch fetcher.
pub async fn search_affiliation<S, F>(
    search: &S,
    batch: &BatchFetcher<F>,
    query: &AffiliationQuery,
) -> Result<SearchOutcome, SearchError>
where
    S: IdentifierSearch + ?Sized,
    F: RecordFetcher,
{
    search_affiliation_with(search, batch, query, |_| {}).await
}

/// [`search_affiliation`], reporting each step to `on_event`.
///
/// `on_event` is not called when the search fails or finds nothing.
pub async fn search_affiliation_with<S, F>(
    search: &S,
    batch: &BatchFetcher<F>,
    query: &AffiliationQuery,
    mut on_event: impl FnMut(SearchEvent<'_>),
) -> Result<SearchOutcome, SearchError>
where
    S: IdentifierSearch + ?Sized,
    F: RecordFetcher,
{
    let ids = search.search_ids(query).await?;
    tracing::info!(affiliation = %query.affiliation, found = ids.len(), "Found identifiers");

    if ids.is_empty() {
        return Ok(SearchOutcome::NoResults);
    }

    on_event(SearchEvent::Found(ids.len()));
    let fetched = batch.fetch_all(&ids).await;
    on_event(SearchEvent::Fetched(&fetched));

    Ok(match_batch(&query.affiliation, ids.len(), fetched))
}
