//! Affiliation search request model.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Default cap on identifiers returned by one search
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// Date format required by the E-utilities `mindate`/`maxdate` parameters
const EUTILS_DATE_FORMAT: &str = "%Y/%m/%d";

/// Affiliation search parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliationQuery {
    /// Free-text institution name
    pub affiliation: String,

    /// How many weeks back from today to search
    pub window_weeks: u32,

    /// Maximum number of identifiers to request
    pub max_results: usize,
}

impl Default for AffiliationQuery {
    fn default() -> Self {
        Self {
            affiliation: String::new(),
            window_weeks: 1,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl AffiliationQuery {
    /// Create a new query for the last week
    pub fn new(affiliation: impl Into<String>) -> Self {
        Self {
            affiliation: affiliation.into(),
            ..Default::default()
        }
    }

    /// Set the search window in weeks
    pub fn window_weeks(mut self, weeks: u32) -> Self {
        self.window_weeks = weeks;
        self
    }

    /// Set maximum results
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Affiliation with quote characters removed, ready to embed in a search term
    pub fn cleaned_affiliation(&self) -> String {
        self.affiliation
            .chars()
            .filter(|c| *c != '"' && *c != '\'')
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// PubMed search term restricting to the affiliation field
    pub fn term(&self) -> String {
        format!("\"{}\"[Affiliation]", self.cleaned_affiliation())
    }

    /// Publication date window ending today (UTC, the calendar PubMed indexes by)
    pub fn date_window(&self) -> DateWindow {
        DateWindow::ending_on(Utc::now().date_naive(), self.window_weeks)
    }
}

/// Inclusive publication date range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Window of `weeks` weeks ending on `end`
    pub fn ending_on(end: NaiveDate, weeks: u32) -> Self {
        let start = end - Duration::days(i64::from(weeks) * 7);
        Self { start, end }
    }

    /// `mindate` parameter value
    pub fn min_date(&self) -> String {
        self.start.format(EUTILS_DATE_FORMAT).to_string()
    }

    /// `maxdate` parameter value
    pub fn max_date(&self) -> String {
        self.end.format(EUTILS_DATE_FORMAT).to_string()
    }
}
