use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use super::retry::RetryPolicy;
use crate::config::Config;
use crate::services::pipeline::{PipelineRunner, RunReport, RunResult};
use crate::services::reporting::{export_csv, load_report};
use crate::stores::SummaryStore;

/// Outcome of one scheduled tick.
#[derive(Debug)]
pub enum ChainOutcome {
    /// ETL failed on every attempt; the report stage was not run.
    EtlFailed,
    /// ETL finished but the report stage failed. The ETL result stands.
    ReportFailed(RunReport),
    Completed(RunReport),
}

/// The `etl → report` stage chain run on every tick.
pub struct PipelineJob {
    runner: Arc<PipelineRunner>,
    summaries: Arc<dyn SummaryStore>,
    config: Arc<Config>,
    retry: RetryPolicy,
}

impl PipelineJob {
    pub fn new(runner: Arc<PipelineRunner>, summaries: Arc<dyn SummaryStore>, config: Arc<Config>) -> Self {
        let retry = RetryPolicy::new(config.pipeline_max_retries, config.retry_delay());
        Self {
            runner,
            summaries,
            config,
            retry,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn run_chain(&self) -> ChainOutcome {
        let runner = self.runner.as_ref();
        let report = match self.retry.run("etl", move || runner.run()).await {
            Ok(report) => report,
            Err(err) => {
                error!("ETL stage failed after retries, skipping report stage: {}", err);
                return ChainOutcome::EtlFailed;
            }
        };

        if report.result == RunResult::NoData {
            info!("No data this run, report stage still refreshes exports");
        }

        let summaries = self.summaries.as_ref();
        let config = self.config.as_ref();
        let exported = self
            .retry
            .run("report", move || async move {
                let summary_report = load_report(summaries, config.report_top_countries).await?;
                export_csv(&summary_report, &config.report_output_dir).await
            })
            .await;

        match exported {
            Ok(paths) => {
                info!(files = paths.len(), "Report stage done");
                ChainOutcome::Completed(report)
            }
            Err(err) => {
                warn!("Report stage failed, summaries are unaffected: {}", err);
                ChainOutcome::ReportFailed(report)
            }
        }
    }
}

pub struct BackgroundScheduler {
    scheduler: JobScheduler,
}

impl BackgroundScheduler {
    pub async fn new(job: Arc<PipelineJob>, config: Arc<Config>) -> anyhow::Result<Self> {
        let scheduler = JobScheduler::new().await?;

        // Ticks missed while the process is down are not replayed.
        let tick_job = job.clone();
        scheduler
            .add(
                Job::new_async(config.pipeline_schedule.as_str(), move |_uuid, _l| {
                    let job = tick_job.clone();
                    Box::pin(async move {
                        info!("Scheduled pipeline tick");
                        job.run_chain().await;
                    })
                })?
            )
            .await?;

        scheduler.start().await?;
        info!(schedule = %config.pipeline_schedule, "Background scheduler started");

        if config.pipeline_run_on_startup {
            tokio::spawn(async move {
                info!("Running pipeline once on startup");
                job.run_chain().await;
            });
        }

        Ok(Self { scheduler })
    }

    pub async fn shutdown(&mut self) {
        if let Err(e) = self.scheduler.shutdown().await {
            warn!("Failed to stop background scheduler: {:?}", e);
        }
        info!("Background scheduler stopped");
    }
}
