pub mod aggregator;
pub mod pipeline;
pub mod reporting;
pub mod upsert_writer;

pub use aggregator::{aggregate, Aggregation};
pub use pipeline::{PipelineRunner, PipelineStatus, RunReport, RunResult, RunState, RunSummary};
pub use reporting::SummaryReport;
pub use upsert_writer::UpsertWriter;
