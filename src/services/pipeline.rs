//! Extract → Transform → Load, one attempt per trigger.
//!
//! The runner never retries on its own: a `Failed` attempt is returned to the
//! caller (the background scheduler or the manual trigger) which owns the retry
//! policy. Every run recomputes all keys present in the raw event log, so
//! repeating a run over unchanged input leaves the summary store unchanged.

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::aggregator::Aggregation;
use super::upsert_writer::UpsertWriter;
use crate::error::PipelineError;
use crate::models::LoadReport;
use crate::stores::{EventStore, SummaryStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Extracting,
    Transforming,
    Loading,
    Done,
    Failed,
}

/// Counts for a run that reached the load stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub events_read: usize,
    pub valid_events: usize,
    pub invalid_records: usize,
    pub unknown_event_types: usize,
    pub groups: usize,
    pub load: LoadReport,
}

impl RunSummary {
    /// Every event read is either grouped or invalid, and every group was
    /// inserted, updated or skipped.
    pub fn is_consistent(&self) -> bool {
        self.events_read == self.valid_events + self.invalid_records && self.groups == self.load.total()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RunResult {
    /// The event store was empty. Not an error.
    NoData,
    Completed(RunSummary),
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub result: RunResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunFailure {
    pub run_id: Uuid,
    pub failed_at: DateTime<Utc>,
    pub error: String,
}

/// An attempt that has started and not yet reached `Done` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InFlightRun {
    pub run_id: Uuid,
    pub state: RunState,
}

/// Shared view over every attempt of one runner. A manual trigger can overlap
/// a scheduled tick, so each in-flight attempt is tracked by its `run_id`.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    /// State of the most recently started in-flight attempt, or how the last
    /// settled attempt ended when nothing is in flight.
    pub state: RunState,
    pub in_flight: Vec<InFlightRun>,
    pub last_report: Option<RunReport>,
    pub last_failure: Option<RunFailure>,
    #[serde(skip)]
    settled: RunState,
}

impl Default for PipelineStatus {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
            in_flight: Vec::new(),
            last_report: None,
            last_failure: None,
            settled: RunState::Idle,
        }
    }
}

impl PipelineStatus {
    fn begin(&mut self, run_id: Uuid) {
        self.in_flight.push(InFlightRun {
            run_id,
            state: RunState::Extracting,
        });
        self.refresh();
    }

    fn advance(&mut self, run_id: Uuid, state: RunState) {
        if let Some(run) = self.in_flight.iter_mut().find(|run| run.run_id == run_id) {
            run.state = state;
        }
        self.refresh();
    }

    fn settle(&mut self, run_id: Uuid, state: RunState) {
        self.in_flight.retain(|run| run.run_id != run_id);
        self.settled = state;
        self.refresh();
    }

    fn refresh(&mut self) {
        self.state = self.in_flight.last().map_or(self.settled, |run| run.state);
    }
}

#[derive(Clone)]
pub struct PipelineRunner {
    events: Arc<dyn EventStore>,
    writer: UpsertWriter,
    status: Arc<RwLock<PipelineStatus>>,
}

impl PipelineRunner {
    pub fn new(events: Arc<dyn EventStore>, summaries: Arc<dyn SummaryStore>) -> Self {
        Self {
            events,
            writer: UpsertWriter::new(summaries),
            status: Arc::new(RwLock::new(PipelineStatus::default())),
        }
    }

    pub async fn state(&self) -> RunState {
        self.status.read().await.state
    }

    pub async fn status(&self) -> PipelineStatus {
        self.status.read().await.clone()
    }

    /// Execute one attempt of the pipeline.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %run_id);
        self.run_attempt(run_id).instrument(span).await
    }

    async fn run_attempt(&self, run_id: Uuid) -> Result<RunReport, PipelineError> {
        let started_at = Utc::now();
        info!("Pipeline run started");

        // Events are folded into the aggregation as they arrive.
        self.status.write().await.begin(run_id);
        let mut aggregation = Aggregation::new();
        let mut events_read = 0usize;
        let mut events = self.events.query_all();
        loop {
            match events.try_next().await {
                Ok(Some(event)) => {
                    events_read += 1;
                    aggregation.push(&event);
                }
                Ok(None) => break,
                Err(err) => return self.fail(run_id, PipelineError::Extract(err)).await,
            }
        }
        drop(events);

        if events_read == 0 {
            info!("No raw events found, nothing to aggregate");
            return Ok(self.finish(run_id, started_at, RunResult::NoData).await);
        }

        self.set_state(run_id, RunState::Transforming).await;
        if aggregation.invalid_count() > 0 {
            warn!(
                invalid = aggregation.invalid_count(),
                total = events_read,
                first_event_id = ?aggregation.invalid().first().map(|e| e.event_id()),
                "Excluded events with missing or unparseable timestamps"
            );
        }
        let summaries = aggregation.summaries();
        info!(
            events = events_read,
            groups = summaries.len(),
            "Aggregated raw events"
        );

        self.set_state(run_id, RunState::Loading).await;
        let load = match self.writer.load(&summaries).await {
            Ok(load) => load,
            Err(err) => return self.fail(run_id, PipelineError::Load(err)).await,
        };

        let summary = RunSummary {
            events_read,
            valid_events: aggregation.valid_count(),
            invalid_records: aggregation.invalid_count(),
            unknown_event_types: aggregation.unknown_event_types(),
            groups: summaries.len(),
            load,
        };
        if !summary.is_consistent() {
            error!(?summary, "Run counts do not add up");
        }

        Ok(self
            .finish(run_id, started_at, RunResult::Completed(summary))
            .await)
    }

    async fn set_state(&self, run_id: Uuid, state: RunState) {
        self.status.write().await.advance(run_id, state);
    }

    async fn finish(&self, run_id: Uuid, started_at: DateTime<Utc>, result: RunResult) -> RunReport {
        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            result,
        };

        let mut status = self.status.write().await;
        status.settle(run_id, RunState::Done);
        status.last_report = Some(report.clone());
        drop(status);

        info!(result = ?report.result, "Pipeline run done");
        report
    }

    async fn fail(&self, run_id: Uuid, err: PipelineError) -> Result<RunReport, PipelineError> {
        error!("Pipeline run failed: {}", err);

        let mut status = self.status.write().await;
        status.settle(run_id, RunState::Failed);
        status.last_failure = Some(RunFailure {
            run_id,
            failed_at: Utc::now(),
            error: err.to_string(),
        });

        Err(err)
    }
}
