use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};

use crate::models::{AggregatedSummary, SummaryFilter};
use crate::AppState;

pub async fn get_summaries(
    Query(filter): Query<SummaryFilter>,
    State(state): State<AppState>,
) -> Result<Json<Vec<AggregatedSummary>>, (StatusCode, Json<serde_json::Value>)> {
    let summaries = state.summary_store.list(&filter).await.map_err(|e| {
        tracing::error!("Error fetching summaries: {:?}", e);
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": format!("Store error: {}", e)})),
        )
    })?;

    Ok(Json(summaries))
}
