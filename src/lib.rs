// Library root - exports for the server binary, tools and tests

pub mod background;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod stores;
pub mod utils;

pub use config::Config;
pub use error::{PipelineError, StoreError, ValidationError};

use axum::{
    routing::{get, post},
    Router,
};
use services::PipelineRunner;
use std::sync::Arc;
use stores::SummaryStore;

#[derive(Clone)]
pub struct AppState {
    pub summary_store: Arc<dyn SummaryStore>,
    pub runner: Arc<PipelineRunner>,
    pub config: Arc<Config>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/summaries", get(handlers::get_summaries))
        .route("/api/reports/summary", get(handlers::get_summary_report))
        .route("/api/pipeline/run", post(handlers::trigger_run))
        .route("/api/pipeline/status", get(handlers::get_status))
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
