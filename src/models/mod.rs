//! Core data models for publication records and search requests.

mod publication;
mod search;

pub use publication::{
    Identifier, MatchedPublication, PublicationBuilder, PublicationRecord, DEFAULT_JOURNAL,
    DEFAULT_TITLE,
};
pub use search::{AffiliationQuery, DateWindow, DEFAULT_MAX_RESULTS};
