use std::sync::Arc;

use tracing::{info, warn};

use crate::error::StoreError;
use crate::models::{AggregatedSummary, LoadReport};
use crate::stores::SummaryStore;

/// Applies aggregated summaries to the summary store, one atomic upsert per key.
#[derive(Clone)]
pub struct UpsertWriter {
    store: Arc<dyn SummaryStore>,
}

impl UpsertWriter {
    pub fn new(store: Arc<dyn SummaryStore>) -> Self {
        Self { store }
    }

    /// Upsert every summary. A rejected record is skipped and the batch goes on;
    /// a connection failure stops the load and is returned. Upserts committed
    /// before the failure stay in place.
    pub async fn load(&self, summaries: &[AggregatedSummary]) -> Result<LoadReport, StoreError> {
        let mut report = LoadReport::default();

        for summary in summaries {
            match self.store.upsert_by_key(summary).await {
                Ok(outcome) if outcome.matched => report.updated += 1,
                Ok(_) => report.inserted += 1,
                Err(StoreError::RecordRejected(reason)) => {
                    warn!(
                        date = %summary.date,
                        country = %summary.country,
                        event_type = %summary.event_type,
                        "Summary rejected by store, skipping: {}",
                        reason
                    );
                    report.skipped += 1;
                }
                Err(err) => {
                    warn!(
                        processed = report.total(),
                        remaining = summaries.len() - report.total(),
                        "Summary store failed mid-load: {}",
                        err
                    );
                    return Err(err);
                }
            }
        }

        debug_assert_eq!(report.total(), summaries.len());
        info!(
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            "Summaries loaded"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UpsertOutcome;
    use crate::stores::MockSummaryStore;
    use chrono::NaiveDate;
    use mockall::Sequence;

    fn summary(event_type: &str, total: i64) -> AggregatedSummary {
        AggregatedSummary {
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            country: "US".to_string(),
            event_type: event_type.to_string(),
            total_events: total,
        }
    }

    #[tokio::test]
    async fn counts_inserts_and_updates() {
        let mut store = MockSummaryStore::new();
        store
            .expect_upsert_by_key()
            .withf(|s| s.event_type == "click")
            .times(1)
            .returning(|_| Ok(UpsertOutcome { matched: true }));
        store
            .expect_upsert_by_key()
            .withf(|s| s.event_type == "view")
            .times(1)
            .returning(|_| Ok(UpsertOutcome { matched: false }));

        let writer = UpsertWriter::new(Arc::new(store));
        let report = writer
            .load(&[summary("click", 3), summary("view", 2)])
            .await
            .unwrap();

        assert_eq!(
            report,
            LoadReport {
                inserted: 1,
                updated: 1,
                skipped: 0
            }
        );
    }

    #[tokio::test]
    async fn rejected_records_are_skipped_and_batch_continues() {
        let mut store = MockSummaryStore::new();
        let mut seq = Sequence::new();
        store
            .expect_upsert_by_key()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(StoreError::RecordRejected("check violation".to_string())));
        store
            .expect_upsert_by_key()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(UpsertOutcome { matched: false }));

        let writer = UpsertWriter::new(Arc::new(store));
        let report = writer
            .load(&[summary("", 1), summary("click", 1), summary("view", 1)])
            .await
            .unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.total(), 3);
    }

    #[tokio::test]
    async fn connection_failure_aborts_the_load() {
        let mut store = MockSummaryStore::new();
        let mut seq = Sequence::new();
        store
            .expect_upsert_by_key()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(UpsertOutcome { matched: false }));
        store
            .expect_upsert_by_key()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(StoreError::ConnectionFailure("connection reset".to_string())));

        let writer = UpsertWriter::new(Arc::new(store));
        let err = writer
            .load(&[summary("click", 1), summary("view", 1), summary("login", 1)])
            .await
            .unwrap_err();

        assert!(err.is_connection_failure());
    }

    #[tokio::test]
    async fn empty_batch_touches_nothing() {
        let store = MockSummaryStore::new();
        let writer = UpsertWriter::new(Arc::new(store));
        assert_eq!(writer.load(&[]).await.unwrap(), LoadReport::default());
    }
}
