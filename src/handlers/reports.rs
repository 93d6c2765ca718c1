use axum::{extract::State, http::StatusCode, response::Json};

use crate::services::reporting::{load_report, SummaryReport};
use crate::AppState;

pub async fn get_summary_report(
    State(state): State<AppState>,
) -> Result<Json<SummaryReport>, (StatusCode, Json<serde_json::Value>)> {
    let report = load_report(state.summary_store.as_ref(), state.config.report_top_countries)
        .await
        .map_err(|e| {
            tracing::error!("Error building summary report: {:?}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"error": e.to_string()})),
            )
        })?;

    Ok(Json(report))
}
