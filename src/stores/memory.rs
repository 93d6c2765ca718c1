use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{EventStore, SummaryStore};
use crate::error::StoreError;
use crate::models::{AggregatedSummary, NewLogEvent, RawLogEvent, SummaryFilter, SummaryKey, UpsertOutcome};

/// In-memory raw event log. Ids are assigned sequentially from 1.
pub struct MemoryEventStore {
    events: Arc<RwLock<Vec<RawLogEvent>>>,
    offline: AtomicBool,
    fail_after: AtomicUsize,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            offline: AtomicBool::new(false),
            fail_after: AtomicUsize::new(usize::MAX),
        }
    }

    pub async fn append(&self, event: NewLogEvent) -> i64 {
        let mut events = self.events.write().await;
        let id = events.len() as i64 + 1;
        events.push(RawLogEvent {
            id,
            timestamp: event.timestamp,
            user_id: event.user_id,
            event_type: event.event_type,
            message: event.message,
            metadata: event.metadata,
        });
        id
    }

    /// While offline every call fails with `ConnectionFailure`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Drop the connection after `count` events have been streamed.
    pub fn fail_after(&self, count: usize) {
        self.fail_after.store(count, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore for MemoryEventStore {
    fn query_all(&self) -> BoxStream<'_, Result<RawLogEvent, StoreError>> {
        if self.offline.load(Ordering::SeqCst) {
            let err = StoreError::ConnectionFailure("event store offline".to_string());
            return stream::once(async move { Err(err) }).boxed();
        }
        let fail_after = self.fail_after.load(Ordering::SeqCst);

        stream::once(async move { self.events.read().await.clone() })
            .flat_map(move |events| {
                let rows = events.into_iter().take(fail_after).map(Ok);
                let dropped = (fail_after != usize::MAX).then(|| {
                    Err(StoreError::ConnectionFailure(
                        "event store connection dropped".to_string(),
                    ))
                });
                stream::iter(rows.chain(dropped))
            })
            .boxed()
    }
}

/// In-memory summary table keyed by `SummaryKey`. Applies the same row checks
/// as the `daily_summary` constraints.
pub struct MemorySummaryStore {
    rows: Arc<RwLock<BTreeMap<SummaryKey, i64>>>,
    offline: AtomicBool,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(BTreeMap::new())),
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::ConnectionFailure("summary store offline".to_string()));
        }
        Ok(())
    }
}

impl Default for MemorySummaryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn check_row(summary: &AggregatedSummary) -> Result<(), StoreError> {
    if summary.event_type.is_empty() {
        return Err(StoreError::RecordRejected("event_type must not be blank".to_string()));
    }
    if summary.country.is_empty() {
        return Err(StoreError::RecordRejected("country must not be blank".to_string()));
    }
    if summary.total_events < 0 {
        return Err(StoreError::RecordRejected("total_events must not be negative".to_string()));
    }
    Ok(())
}

#[async_trait]
impl SummaryStore for MemorySummaryStore {
    async fn upsert_by_key(&self, summary: &AggregatedSummary) -> Result<UpsertOutcome, StoreError> {
        self.check_online()?;
        check_row(summary)?;

        // Single write-lock section: lookup and replace cannot interleave with another writer.
        let mut rows = self.rows.write().await;
        let previous = rows.insert(summary.key(), summary.total_events);
        Ok(UpsertOutcome {
            matched: previous.is_some(),
        })
    }

    async fn list(&self, filter: &SummaryFilter) -> Result<Vec<AggregatedSummary>, StoreError> {
        self.check_online()?;
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .map(|(key, total)| AggregatedSummary::new(key.clone(), *total))
            .filter(|summary| filter.matches(summary))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn summary(country: &str, event_type: &str, total: i64) -> AggregatedSummary {
        AggregatedSummary {
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            country: country.to_string(),
            event_type: event_type.to_string(),
            total_events: total,
        }
    }

    #[tokio::test]
    async fn upsert_reports_match_on_second_write() {
        let store = MemorySummaryStore::new();
        let first = store.upsert_by_key(&summary("US", "click", 3)).await.unwrap();
        let second = store.upsert_by_key(&summary("US", "click", 5)).await.unwrap();

        assert!(!first.matched);
        assert!(second.matched);
        assert_eq!(store.list_all().await.unwrap(), vec![summary("US", "click", 5)]);
    }

    #[tokio::test]
    async fn blank_event_type_is_rejected() {
        let store = MemorySummaryStore::new();
        let err = store.upsert_by_key(&summary("US", "", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::RecordRejected(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn offline_stores_fail_with_connection_errors() {
        let events = MemoryEventStore::new();
        events.set_offline(true);
        let first = events.query_all().next().await.unwrap();
        assert!(first.unwrap_err().is_connection_failure());

        let summaries = MemorySummaryStore::new();
        summaries.set_offline(true);
        let err = summaries.upsert_by_key(&summary("US", "click", 1)).await.unwrap_err();
        assert!(err.is_connection_failure());
    }

    #[tokio::test]
    async fn stream_ends_with_error_after_dropped_connection() {
        let store = MemoryEventStore::new();
        for _ in 0..3 {
            store
                .append(NewLogEvent {
                    timestamp: None,
                    user_id: 1,
                    event_type: "view".to_string(),
                    message: String::new(),
                    metadata: None,
                })
                .await;
        }
        store.fail_after(2);

        let items: Vec<_> = store.query_all().collect().await;
        assert_eq!(items.len(), 3);
        assert!(items[..2].iter().all(|item| item.is_ok()));
        assert!(items[2].as_ref().unwrap_err().is_connection_failure());
    }

    #[tokio::test]
    async fn event_ids_are_sequential() {
        let store = MemoryEventStore::new();
        let new_event = || NewLogEvent {
            timestamp: None,
            user_id: 1,
            event_type: "view".to_string(),
            message: String::new(),
            metadata: None,
        };
        assert_eq!(store.append(new_event()).await, 1);
        assert_eq!(store.append(new_event()).await, 2);
        assert_eq!(store.len().await, 2);
    }
}
