//! Publication model parsed from a single PubMed record.

use serde::{Deserialize, Serialize};

/// Title used when a record carries no usable article title.
pub const DEFAULT_TITLE: &str = "No title available";

/// Journal used when a record names neither a journal title nor an ISO abbreviation.
pub const DEFAULT_JOURNAL: &str = "Journal not specified";

/// Opaque token naming one record upstream (a PMID for PubMed).
pub type Identifier = String;

/// A publication record with per-author affiliations.
///
/// `authors` and `affiliations` are parallel: entry `i` of each describes the same
/// author. An author without affiliation text has an empty string in
/// `affiliations`, so both vectors always have the same length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    /// PubMed identifier
    pub pmid: Identifier,

    /// Article title
    pub title: String,

    /// Journal title or ISO abbreviation
    pub journal: String,

    /// Author display names, in byline order
    pub authors: Vec<String>,

    /// Affiliation text per author
    pub affiliations: Vec<String>,

    /// Digital Object Identifier
    pub doi: Option<String>,
}

impl PublicationRecord {
    /// Create a record with default title and journal and no authors
    pub fn new(pmid: impl Into<Identifier>) -> Self {
        Self {
            pmid: pmid.into(),
            title: DEFAULT_TITLE.to_string(),
            journal: DEFAULT_JOURNAL.to_string(),
            authors: Vec::new(),
            affiliations: Vec::new(),
            doi: None,
        }
    }

    /// Iterate `(author, affiliation)` pairs in byline order
    pub fn author_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.authors
            .iter()
            .zip(self.affiliations.iter())
            .map(|(a, f)| (a.as_str(), f.as_str()))
    }

    /// PubMed page for this record
    pub fn url(&self) -> String {
        format!("https://pubmed.ncbi.nlm.nih.gov/{}/", self.pmid)
    }

    /// Resolver link for the DOI, if the record has one
    pub fn doi_url(&self) -> Option<String> {
        self.doi
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(|d| format!("https://doi.org/{}", d))
    }
}

/// Builder for constructing PublicationRecord objects
#[derive(Debug, Clone)]
pub struct PublicationBuilder {
    record: PublicationRecord,
}

impl PublicationBuilder {
    /// Create a new builder for the given identifier
    pub fn new(pmid: impl Into<Identifier>) -> Self {
        Self {
            record: PublicationRecord::new(pmid),
        }
    }

    /// Set the title; blank titles keep the default
    pub fn title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        if !title.trim().is_empty() {
            self.record.title = title;
        }
        self
    }

    /// Set the journal; blank names keep the default
    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        let journal = journal.into();
        if !journal.trim().is_empty() {
            self.record.journal = journal;
        }
        self
    }

    /// Append one author together with their affiliation (empty when unknown)
    pub fn author(mut self, name: impl Into<String>, affiliation: impl Into<String>) -> Self {
        self.record.authors.push(name.into());
        self.record.affiliations.push(affiliation.into());
        self
    }

    /// Set DOI; blank values leave it unset
    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        let doi = doi.into();
        if !doi.trim().is_empty() {
            self.record.doi = Some(doi);
        }
        self
    }

    /// Build the record
    pub fn build(self) -> PublicationRecord {
        self.record
    }
}

/// A record together with the authors whose affiliation matched a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedPublication {
    /// Matching authors, in byline order
    pub matched_authors: Vec<String>,

    #[serde(flatten)]
    pub record: PublicationRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let record = PublicationRecord::new("123");
        assert_eq!(record.title, DEFAULT_TITLE);
        assert_eq!(record.journal, DEFAULT_JOURNAL);
        assert!(record.doi.is_none());
        assert!(record.doi_url().is_none());
    }

    #[test]
    fn test_builder_keeps_authors_parallel() {
        let record = PublicationBuilder::new("42")
            .title("Gut microbiome")
            .author("Smith John", "MIT CSAIL")
            .author("Doe Jane", "")
            .author("Lee Ann", "Broad Institute")
            .build();

        assert_eq!(record.authors.len(), record.affiliations.len());
        let entries: Vec<_> = record.author_entries().collect();
        assert_eq!(entries[1], ("Doe Jane", ""));
        assert_eq!(entries[2], ("Lee Ann", "Broad Institute"));
    }

    #[test]
    fn test_builder_ignores_blank_values() {
        let record = PublicationBuilder::new("7")
            .title("  ")
            .journal("")
            .doi("")
            .build();

        assert_eq!(record.title, DEFAULT_TITLE);
        assert_eq!(record.journal, DEFAULT_JOURNAL);
        assert!(record.doi.is_none());
    }

    #[test]
    fn test_urls() {
        let record = PublicationBuilder::new("38000001")
            .doi("10.1000/xyz")
            .build();
        assert_eq!(record.url(), "https://pubmed.ncbi.nlm.nih.gov/38000001/");
        assert_eq!(
            record.doi_url().as_deref(),
            Some("https://doi.org/10.1000/xyz")
        );
    }
}
