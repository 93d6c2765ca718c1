use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use log_summary_pipeline::background::scheduler::{BackgroundScheduler, PipelineJob};
use log_summary_pipeline::config::{Config, LogFormat};
use log_summary_pipeline::database;
use log_summary_pipeline::services::PipelineRunner;
use log_summary_pipeline::stores::{EventStore, PgEventStore, PgSummaryStore, SummaryStore};
use log_summary_pipeline::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Load configuration
    let config = Arc::new(Config::from_env()?);

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "log_summary_pipeline=debug,tower_http=debug".into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    info!("Starting log summary pipeline...");

    // One pool for the whole process, shared by both stores
    let db_pool = database::new_pool(&config.database_url, config.database_max_connections).await?;
    info!("Database connection pool created");

    let result = serve(db_pool.clone(), config).await;

    db_pool.close().await;
    info!("Database connection pool closed");

    result
}

async fn serve(db_pool: database::DatabasePool, config: Arc<Config>) -> anyhow::Result<()> {
    database::run_migrations(&db_pool).await?;

    let event_store: Arc<dyn EventStore> = Arc::new(PgEventStore::new(db_pool.clone()));
    let summary_store: Arc<dyn SummaryStore> = Arc::new(PgSummaryStore::new(db_pool.clone()));
    let runner = Arc::new(PipelineRunner::new(event_store, summary_store.clone()));

    let job = Arc::new(PipelineJob::new(runner.clone(), summary_store.clone(), config.clone()));
    let mut scheduler = BackgroundScheduler::new(job, config.clone()).await?;

    let app = build_router(AppState {
        summary_store,
        runner,
        config: config.clone(),
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    // Graceful shutdown
    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutting down gracefully...");
        }
    }

    scheduler.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
