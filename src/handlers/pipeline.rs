use axum::{extract::State, http::StatusCode, response::Json};

use crate::services::pipeline::{PipelineStatus, RunReport};
use crate::AppState;

/// Run one pipeline attempt now. No retry: a failed attempt is returned as 503
/// and the next scheduled tick tries again.
pub async fn trigger_run(
    State(state): State<AppState>,
) -> Result<Json<RunReport>, (StatusCode, Json<serde_json::Value>)> {
    tracing::info!("Manual pipeline run requested");

    let report = state.runner.run().await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": e.to_string(), "state": "failed"})),
        )
    })?;

    Ok(Json(report))
}

pub async fn get_status(State(state): State<AppState>) -> Json<PipelineStatus> {
    Json(state.runner.status().await)
}
