//! Rendering of matched publications and search status messages.

mod html;

pub use html::{render_html, render_html_card, render_html_error};

use comfy_table::{presets, Attribute, Cell, ContentArrangement, Table};

use crate::models::{AffiliationQuery, MatchedPublication};
use crate::pipeline::SearchOutcome;

/// Output format for rendered publications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human-readable table
    Table,
    /// One block of lines per publication
    Plain,
    /// Pretty-printed JSON array
    Json,
    /// `publication-card` HTML fragments
    Html,
}

/// Suggestions shown after a failed search
pub const FAILURE_GUIDANCE: [&str; 3] = [
    "Using a shorter or more general affiliation name",
    "Reducing the number of weeks to search",
    "Checking your internet connection",
];

/// Message for a search that returned no identifiers
pub fn no_results_message(query: &AffiliationQuery) -> String {
    format!(
        "No publications found for \"{}\" in the last {} week(s).",
        query.affiliation, query.window_weeks
    )
}

/// Message for a search whose records all failed the affiliation filter
pub fn no_match_message(query: &AffiliationQuery) -> String {
    format!(
        "Found publications but none matched the affiliation \"{}\" exactly. \
         Try using a shorter or more general affiliation name.",
        query.affiliation
    )
}

/// Summary line for a successful search
pub fn matches_message(count: usize, query: &AffiliationQuery) -> String {
    format!(
        "Found {} publications matching \"{}\".",
        count, query.affiliation
    )
}

/// Message for a hard failure, with remediation suggestions
pub fn failure_message(error: &dyn std::fmt::Display) -> String {
    let mut message = format!("An error occurred: {}\n\nPlease try:", error);
    for hint in FAILURE_GUIDANCE {
        message.push_str("\n  - ");
        message.push_str(hint);
    }
    message
}

/// Status message for an outcome
pub fn outcome_message(outcome: &SearchOutcome, query: &AffiliationQuery) -> String {
    match outcome {
        SearchOutcome::NoResults => no_results_message(query),
        SearchOutcome::NoAffiliationMatch { .. } => no_match_message(query),
        SearchOutcome::Matches { publications, .. } => matches_message(publications.len(), query),
    }
}

/// Render publications in the requested format
pub fn render_publications(
    publications: &[MatchedPublication],
    format: Format,
) -> Result<String, serde_json::Error> {
    Ok(match format {
        Format::Table => render_table(publications),
        Format::Plain => render_plain(publications),
        Format::Json => serde_json::to_string_pretty(publications)?,
        Format::Html => publications
            .iter()
            .map(render_html_card)
            .collect::<Vec<_>>()
            .join("\n"),
    })
}

fn render_table(publications: &[MatchedPublication]) -> String {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Authors", "Title", "Journal", "DOI"]);

    for publication in publications {
        let record = &publication.record;
        table.add_row(vec![
            Cell::new(publication.matched_authors.join(", ")),
            Cell::new(&record.title).add_attribute(Attribute::Bold),
            Cell::new(&record.journal),
            Cell::new(record.doi_url().unwrap_or_default()),
        ]);
    }

    table.to_string()
}

fn render_plain(publications: &[MatchedPublication]) -> String {
    let mut out = String::new();
    for publication in publications {
        let record = &publication.record;
        out.push_str(&format!("{}\n", record.title));
        out.push_str(&format!("  Authors: {}\n", publication.matched_authors.join(", ")));
        out.push_str(&format!("  Journal: {}\n", record.journal));
        out.push_str(&format!("  PubMed:  {}\n", record.url()));
        if let Some(doi_url) = record.doi_url() {
            out.push_str(&format!("  DOI:     {}\n", doi_url));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PublicationBuilder;

    fn publication(doi: &str) -> MatchedPublication {
        MatchedPublication {
            matched_authors: vec!["Smith John".to_string(), "Lee Ann".to_string()],
            record: PublicationBuilder::new("42")
                .title("Retinal atlas")
                .journal("Nature")
                .author("Smith John", "MIT")
                .author("Lee Ann", "MIT")
                .doi(doi)
                .build(),
        }
    }

    #[test]
    fn test_messages_are_distinct() {
        let query = AffiliationQuery::new("MIT").window_weeks(2);
        assert_eq!(
            no_results_message(&query),
            "No publications found for \"MIT\" in the last 2 week(s)."
        );
        assert!(no_match_message(&query).starts_with("Found publications but none matched"));
        assert_eq!(
            matches_message(3, &query),
            "Found 3 publications matching \"MIT\"."
        );
    }

    #[test]
    fn test_failure_message_has_guidance() {
        let message = failure_message(&"Network error: timed out");
        assert!(message.starts_with("An error occurred: Network error: timed out"));
        for hint in FAILURE_GUIDANCE {
            assert!(message.contains(hint));
        }
    }

    #[test]
    fn test_outcome_message() {
        let query = AffiliationQuery::new("MIT");
        let outcome = SearchOutcome::Matches {
            found: 5,
            publications: vec![publication("")],
        };
        assert_eq!(
            outcome_message(&outcome, &query),
            "Found 1 publications matching \"MIT\"."
        );
        assert_eq!(
            outcome_message(&SearchOutcome::NoResults, &query),
            no_results_message(&query)
        );
    }

    #[test]
    fn test_plain_output() {
        let out = render_publications(&[publication("10.1/x")], Format::Plain).unwrap();
        assert!(out.contains("Retinal atlas"));
        assert!(out.contains("Authors: Smith John, Lee Ann"));
        assert!(out.contains("https://doi.org/10.1/x"));

        let out = render_publications(&[publication("")], Format::Plain).unwrap();
        assert!(!out.contains("DOI:"));
    }

    #[test]
    fn test_table_output() {
        let out = render_publications(&[publication("10.1/x")], Format::Table).unwrap();
        assert!(out.contains("Authors"));
        assert!(out.contains("Nature"));
    }

    #[test]
    fn test_json_output() {
        let out = render_publications(&[publication("10.1/x")], Format::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["pmid"], "42");
        assert_eq!(value[0]["doi"], "10.1/x");
        assert_eq!(value[0]["matched_authors"][1], "Lee Ann");
    }
}
