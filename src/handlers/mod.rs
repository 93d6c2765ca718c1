pub mod pipeline;
pub mod reports;
pub mod summaries;

pub use pipeline::{get_status, trigger_run};
pub use reports::get_summary_report;
pub use summaries::get_summaries;
