//! # medfetch
//!
//! Find recent PubMed publications whose authors list a given institution
//! in their affiliation.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (PublicationRecord, AffiliationQuery, etc.)
//! - [`sources`]: The search and per-record fetch seams, plus the PubMed client
//! - [`batch`]: Bounded-concurrency, spaced fetching of many records
//! - [`matcher`]: Affiliation filtering of parsed records
//! - [`pipeline`]: Search, fetch and filter wired together for one request
//! - [`render`]: Table, plain text, JSON and HTML output
//! - [`utils`]: HTTP client and other utilities
//! - [`config`]: Configuration management

pub mod batch;
pub mod config;
pub mod matcher;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod sources;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use batch::{BatchConfig, BatchFetcher, BatchResult, CancellationFlag};
pub use matcher::AffiliationMatcher;
pub use models::{AffiliationQuery, MatchedPublication, PublicationRecord};
pub use pipeline::{search_affiliation, SearchOutcome};
pub use sources::{FetchError, IdentifierSearch, PubMedClient, RecordFetcher, SearchError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
