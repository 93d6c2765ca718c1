//! Store seams for the pipeline. Postgres backs both stores in production; the
//! in-memory versions back tests and local experiments.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::StoreError;
use crate::models::{AggregatedSummary, RawLogEvent, SummaryFilter, UpsertOutcome};

pub mod memory;
pub mod postgres;

pub use memory::{MemoryEventStore, MemorySummaryStore};
pub use postgres::{PgEventStore, PgSummaryStore};

/// Read side of the append-only raw event log.
pub trait EventStore: Send + Sync {
    /// Every raw event currently in the store, one at a time in id order.
    /// No watermark, no paging. An `Err` item ends the read.
    fn query_all(&self) -> BoxStream<'_, Result<RawLogEvent, StoreError>>;
}

/// Keyed summary table. Writes go through `upsert_by_key` only.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Atomically insert the summary, or replace the record with the same
    /// `(date, country, event_type)` key.
    async fn upsert_by_key(&self, summary: &AggregatedSummary) -> Result<UpsertOutcome, StoreError>;

    async fn list(&self, filter: &SummaryFilter) -> Result<Vec<AggregatedSummary>, StoreError>;

    async fn list_all(&self) -> Result<Vec<AggregatedSummary>, StoreError> {
        self.list(&SummaryFilter::default()).await
    }
}
