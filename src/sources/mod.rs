//! Upstream literature source seams.
//!
//! Two traits separate the batch scheduler and the pipeline from the network:
//!
//! - [`IdentifierSearch`]: one search call returning the identifiers that match
//!   an affiliation query
//! - [`RecordFetcher`]: one fetch call returning a parsed record for one identifier
//!
//! [`PubMedClient`] implements both against NCBI E-utilities. [`MockFetcher`]
//! is a scripted fetcher for tests.

pub mod mock;
mod pubmed;

pub use mock::{MockFetcher, MockSearch};
pub use pubmed::{parse_record, PubMedClient};

use crate::models::{AffiliationQuery, Identifier, PublicationRecord};
use async_trait::async_trait;

/// Fetches and parses a single record.
///
/// Implementations issue exactly one upstream request per call and neither
/// cache nor retry; those policies belong to the caller.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    /// Fetch the record named by `id`
    async fn fetch(&self, id: &str) -> Result<PublicationRecord, FetchError>;
}

/// Resolves an affiliation query to record identifiers.
#[async_trait]
pub trait IdentifierSearch: Send + Sync {
    /// Search for identifiers matching `query`, in upstream order
    async fn search_ids(&self, query: &AffiliationQuery) -> Result<Vec<Identifier>, SearchError>;
}

#[async_trait]
impl<T: RecordFetcher + ?Sized> RecordFetcher for std::sync::Arc<T> {
    async fn fetch(&self, id: &str) -> Result<PublicationRecord, FetchError> {
        (**self).fetch(id).await
    }
}

#[async_trait]
impl<T: IdentifierSearch + ?Sized> IdentifierSearch for std::sync::Arc<T> {
    async fn search_ids(&self, query: &AffiliationQuery) -> Result<Vec<Identifier>, SearchError> {
        (**self).search_ids(query).await
    }
}

/// Per-identifier fetch failure. Never fatal to a batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Transport failure or non-success status
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Payload had no recognizable article
    #[error("Parse failed: {0}")]
    ParseFailed(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::RequestFailed(err.to_string())
    }
}

impl From<quick_xml::DeError> for FetchError {
    fn from(err: quick_xml::DeError) -> Self {
        FetchError::ParseFailed(format!("XML: {}", err))
    }
}

/// Failure of the search call. Fatal to the whole request.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Network or HTTP transport error
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream answered with a non-success status
    #[error("API error: {0}")]
    Api(String),

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Query rejected before any request was sent
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        SearchError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Parse(format!("JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FetchError::RequestFailed("status 500".to_string());
        assert_eq!(err.to_string(), "Request failed: status 500");

        let err = SearchError::Parse("bad json".to_string());
        assert_eq!(err.to_string(), "Parse error: bad json");
    }

    #[test]
    fn test_json_error_converts_to_parse() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(SearchError::from(err), SearchError::Parse(_)));
    }
}
