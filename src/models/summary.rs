use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};

/// Composite key of the summary table. Unique across the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SummaryKey {
    pub date: NaiveDate,
    pub country: String,
    pub event_type: String,
}

/// One compacted bucket: the number of events for a `(date, country, event_type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregatedSummary {
    pub date: NaiveDate,
    pub country: String,
    pub event_type: String,
    pub total_events: i64,
}

impl AggregatedSummary {
    pub fn new(key: SummaryKey, total_events: i64) -> Self {
        Self {
            date: key.date,
            country: key.country,
            event_type: key.event_type,
            total_events,
        }
    }

    pub fn key(&self) -> SummaryKey {
        SummaryKey {
            date: self.date,
            country: self.country.clone(),
            event_type: self.event_type.clone(),
        }
    }
}

impl<'r> FromRow<'r, PgRow> for AggregatedSummary {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            date: row.try_get("date")?,
            country: row.try_get("country")?,
            event_type: row.try_get("event_type")?,
            total_events: row.try_get("total_events")?,
        })
    }
}

/// Optional narrowing of a summary listing. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SummaryFilter {
    #[serde(default, deserialize_with = "crate::utils::date::deserialize_opt")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
}

impl SummaryFilter {
    pub fn matches(&self, summary: &AggregatedSummary) -> bool {
        self.date.map_or(true, |d| d == summary.date)
            && self
                .country
                .as_deref()
                .filter(|c| !c.is_empty())
                .map_or(true, |c| c == summary.country)
            && self
                .event_type
                .as_deref()
                .filter(|t| !t.is_empty())
                .map_or(true, |t| t == summary.event_type)
    }
}

/// Result of one atomic upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// True when an existing record with the same key was replaced.
    pub matched: bool,
}

/// Tally of a whole load. `inserted + updated + skipped` equals the number of
/// summaries handed to the writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl LoadReport {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.skipped
    }
}
