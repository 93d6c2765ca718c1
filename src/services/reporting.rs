//! Rollups over the summary table for downstream consumers, plus CSV export.
//! Reads only aggregated data; an empty summary table gives an empty report.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::ReportError;
use crate::models::AggregatedSummary;
use crate::stores::SummaryStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeTotal {
    pub event_type: String,
    pub total_events: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryTotal {
    pub country: String,
    pub total_events: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total_events: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryReport {
    pub records: usize,
    pub total_events: i64,
    /// Descending by total, ties by name.
    pub events_by_type: Vec<TypeTotal>,
    pub top_countries: Vec<CountryTotal>,
    /// Ascending by date.
    pub daily_totals: Vec<DailyTotal>,
}

impl SummaryReport {
    pub fn build(summaries: &[AggregatedSummary], top_countries: usize) -> Self {
        let mut by_type: HashMap<&str, i64> = HashMap::new();
        let mut by_country: HashMap<&str, i64> = HashMap::new();
        let mut by_date: HashMap<NaiveDate, i64> = HashMap::new();

        for summary in summaries {
            *by_type.entry(summary.event_type.as_str()).or_insert(0) += summary.total_events;
            *by_country.entry(summary.country.as_str()).or_insert(0) += summary.total_events;
            *by_date.entry(summary.date).or_insert(0) += summary.total_events;
        }

        let mut events_by_type: Vec<TypeTotal> = by_type
            .into_iter()
            .map(|(event_type, total_events)| TypeTotal {
                event_type: event_type.to_string(),
                total_events,
            })
            .collect();
        events_by_type.sort_by(|a, b| {
            b.total_events
                .cmp(&a.total_events)
                .then_with(|| a.event_type.cmp(&b.event_type))
        });

        let mut countries: Vec<CountryTotal> = by_country
            .into_iter()
            .map(|(country, total_events)| CountryTotal {
                country: country.to_string(),
                total_events,
            })
            .collect();
        countries.sort_by(|a, b| {
            b.total_events
                .cmp(&a.total_events)
                .then_with(|| a.country.cmp(&b.country))
        });
        countries.truncate(top_countries);

        let mut daily_totals: Vec<DailyTotal> = by_date
            .into_iter()
            .map(|(date, total_events)| DailyTotal { date, total_events })
            .collect();
        daily_totals.sort_by_key(|d| d.date);

        Self {
            records: summaries.len(),
            total_events: summaries.iter().map(|s| s.total_events).sum(),
            events_by_type,
            top_countries: countries,
            daily_totals,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}

/// Read the whole summary table and build a report.
pub async fn load_report(store: &dyn SummaryStore, top_countries: usize) -> Result<SummaryReport, ReportError> {
    let summaries = store.list_all().await?;
    if summaries.is_empty() {
        warn!("Summary table is empty, report will be empty");
    }
    Ok(SummaryReport::build(&summaries, top_countries))
}

/// Write the three rollups as CSV files into `dir`, creating it if needed.
/// Returns the paths written.
pub async fn export_csv(report: &SummaryReport, dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ReportError::Io {
            path: dir.display().to_string(),
            source,
        })?;

    let files = [
        (
            "summary_events_by_type.csv",
            ["event_type", "total_events"],
            report
                .events_by_type
                .iter()
                .map(|t| [t.event_type.clone(), t.total_events.to_string()])
                .collect::<Vec<_>>(),
        ),
        (
            "summary_top_countries.csv",
            ["country", "total_events"],
            report
                .top_countries
                .iter()
                .map(|c| [c.country.clone(), c.total_events.to_string()])
                .collect(),
        ),
        (
            "summary_daily_events.csv",
            ["date", "total_events"],
            report
                .daily_totals
                .iter()
                .map(|d| [d.date.format("%Y-%m-%d").to_string(), d.total_events.to_string()])
                .collect(),
        ),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, header, rows) in files {
        let path = dir.join(name);
        let contents = encode_csv(header, &rows).map_err(|source| ReportError::Csv {
            path: path.display().to_string(),
            source,
        })?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| ReportError::Io {
                path: path.display().to_string(),
                source,
            })?;
        written.push(path);
    }

    info!(dir = %dir.display(), files = written.len(), "CSV reports saved");
    Ok(written)
}

/// Header row first, so an empty rollup still yields a readable file.
fn encode_csv(header: [&str; 2], rows: &[[String; 2]]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}
