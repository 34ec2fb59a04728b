//! HTML fragments for embedding results in a page.

use crate::models::{AffiliationQuery, MatchedPublication};
use crate::pipeline::SearchOutcome;
use crate::render::{outcome_message, FAILURE_GUIDANCE};
use crate::utils::escape_html;

/// One `publication-card` block
pub fn render_html_card(publication: &MatchedPublication) -> String {
    let record = &publication.record;
    let mut card = String::from("<div class=\"publication-card\">\n");

    card.push_str(&format!(
        "  <div class=\"publication-authors\"><span class=\"emoji\">🔬</span> {}</div>\n",
        escape_html(&publication.matched_authors.join(", "))
    ));
    card.push_str(&format!(
        "  <div class=\"publication-title\"><span class=\"emoji\">📚</span> {}</div>\n",
        escape_html(&record.title)
    ));
    card.push_str(&format!(
        "  <div class=\"publication-journal\"><span class=\"emoji\">📝</span> {}</div>\n",
        escape_html(&record.journal)
    ));
    if let Some(doi_url) = record.doi_url() {
        let doi_url = escape_html(&doi_url);
        card.push_str(&format!(
            "  <div class=\"publication-doi\"><span class=\"emoji\">🔗</span> \
             <a href=\"{0}\" target=\"_blank\">{0}</a></div>\n",
            doi_url
        ));
    }

    card.push_str("</div>");
    card
}

/// Alert banner plus cards for a whole outcome
pub fn render_html(outcome: &SearchOutcome, query: &AffiliationQuery) -> String {
    let class = match outcome {
        SearchOutcome::NoResults => "alert alert-info",
        SearchOutcome::NoAffiliationMatch { .. } => "alert alert-warning",
        SearchOutcome::Matches { .. } => "alert alert-success mb-4",
    };

    let mut out = format!(
        "<div class=\"{}\">{}</div>",
        class,
        escape_html(&outcome_message(outcome, query))
    );
    for publication in outcome.publications() {
        out.push('\n');
        out.push_str(&render_html_card(publication));
    }
    out
}

/// Error banner with remediation suggestions
pub fn render_html_error(error: &dyn std::fmt::Display) -> String {
    let items: String = FAILURE_GUIDANCE
        .iter()
        .map(|hint| format!("<li>{}</li>", hint))
        .collect();
    format!(
        "<div class=\"alert alert-danger\">An error occurred: {}<br><br>Please try:<ul>{}</ul></div>",
        escape_html(&error.to_string()),
        items
    )
}
