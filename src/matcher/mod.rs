//! Affiliation filtering.
//!
//! A query such as `"MIT, Cambridge"` is split on runs of whitespace and commas
//! into lowercase tokens (`["mit", "cambridge"]`). An author matches when their
//! affiliation contains any token as a case-insensitive substring, so `"mit"`
//! matches `"MIT CSAIL"` but not `"Massachusetts Institute of Technology"`.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{MatchedPublication, PublicationRecord};

fn token_separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"[\s,]+").expect("separator pattern is valid"))
}

/// Matches author affiliations against a free-text institution query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffiliationMatcher {
    tokens: Vec<String>,
}

impl AffiliationMatcher {
    /// Tokenize `query`. Empty tokens are dropped, so a blank query matches nothing.
    pub fn new(query: &str) -> Self {
        let tokens = token_separator()
            .split(&query.to_lowercase())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Self { tokens }
    }

    /// Lowercased query tokens
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Whether a single affiliation string contains any token
    pub fn matches_affiliation(&self, affiliation: &str) -> bool {
        if affiliation.is_empty() {
            return false;
        }
        let affiliation = affiliation.to_lowercase();
        self.tokens.iter().any(|t| affiliation.contains(t.as_str()))
    }

    /// Authors of `record` whose parallel affiliation matched, in byline order
    pub fn matched_authors<'a>(&self, record: &'a PublicationRecord) -> Vec<&'a str> {
        record
            .author_entries()
            .filter(|(_, affiliation)| self.matches_affiliation(affiliation))
            .map(|(author, _)| author)
            .collect()
    }

    /// Pair `record` with its matching authors, or `None` if no author matched
    pub fn match_record(&self, record: PublicationRecord) -> Option<MatchedPublication> {
        let matched_authors: Vec<String> = self
            .matched_authors(&record)
            .into_iter()
            .map(str::to_string)
            .collect();

        if matched_authors.is_empty() {
            tracing::debug!(pmid = %record.pmid, "No affiliated authors found");
            return None;
        }

        Some(MatchedPublication {
            matched_authors,
            record,
        })
    }

    /// Keep only the records with at least one matching author
    pub fn filter(
        &self,
        records: impl IntoIterator<Item = PublicationRecord>,
    ) -> Vec<MatchedPublication> {
        records
            .into_iter()
            .filter_map(|r| self.match_record(r))
            .collect()
    }
}
