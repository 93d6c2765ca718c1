use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use sqlx::{QueryBuilder, Row};

use super::{EventStore, SummaryStore};
use crate::database::DatabasePool;
use crate::error::StoreError;
use crate::models::{AggregatedSummary, NewLogEvent, RawLogEvent, SummaryFilter, UpsertOutcome};

/// `raw_logs` table.
#[derive(Clone)]
pub struct PgEventStore {
    pool: DatabasePool,
}

impl PgEventStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Append one raw event and return its assigned id.
    pub async fn insert(&self, event: &NewLogEvent) -> Result<i64, StoreError> {
        let metadata = event
            .metadata
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StoreError::RecordRejected(format!("Invalid metadata: {}", e)))?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO raw_logs (timestamp, user_id, event_type, message, metadata)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&event.timestamp)
        .bind(event.user_id)
        .bind(&event.event_type)
        .bind(&event.message)
        .bind(metadata)
        .fetch_one(&*self.pool)
        .await?;

        Ok(id)
    }
}

impl EventStore for PgEventStore {
    fn query_all(&self) -> BoxStream<'_, Result<RawLogEvent, StoreError>> {
        sqlx::query_as::<_, RawLogEvent>(
            r#"
            SELECT id, timestamp, user_id, event_type, message, metadata
            FROM raw_logs
            ORDER BY id
            "#,
        )
        .fetch(&*self.pool)
        .map_err(StoreError::from)
        .boxed()
    }
}

/// `daily_summary` table.
#[derive(Clone)]
pub struct PgSummaryStore {
    pool: DatabasePool,
}

impl PgSummaryStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SummaryStore for PgSummaryStore {
    async fn upsert_by_key(&self, summary: &AggregatedSummary) -> Result<UpsertOutcome, StoreError> {
        // xmax is 0 only for a freshly inserted tuple
        let row = sqlx::query(
            r#"
            INSERT INTO daily_summary (date, country, event_type, total_events)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (date, country, event_type)
            DO UPDATE SET total_events = EXCLUDED.total_events, updated_at = NOW()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(summary.date)
        .bind(&summary.country)
        .bind(&summary.event_type)
        .bind(summary.total_events)
        .fetch_one(&*self.pool)
        .await?;

        let inserted: bool = row.try_get("inserted")?;
        Ok(UpsertOutcome { matched: !inserted })
    }

    async fn list(&self, filter: &SummaryFilter) -> Result<Vec<AggregatedSummary>, StoreError> {
        let mut query_builder: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(
            "SELECT date, country, event_type, total_events FROM daily_summary WHERE 1=1",
        );

        if let Some(date) = filter.date {
            query_builder.push(" AND date = ");
            query_builder.push_bind(date);
        }

        if let Some(country) = filter.country.as_deref().filter(|c| !c.is_empty()) {
            query_builder.push(" AND country = ");
            query_builder.push_bind(country.to_string());
        }

        if let Some(event_type) = filter.event_type.as_deref().filter(|t| !t.is_empty()) {
            query_builder.push(" AND event_type = ");
            query_builder.push_bind(event_type.to_string());
        }

        query_builder.push(" ORDER BY date, country, event_type");

        let summaries = query_builder
            .build_query_as::<AggregatedSummary>()
            .fetch_all(&*self.pool)
            .await?;

        Ok(summaries)
    }
}
