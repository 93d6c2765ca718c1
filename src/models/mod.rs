//! Shared types: raw log events, summary records and load tallies.

pub mod event_type;
pub mod log_event;
pub mod summary;

pub use event_type::EventType;
pub use log_event::{EventMetadata, NewLogEvent, RawLogEvent, UNKNOWN_COUNTRY};
pub use summary::{AggregatedSummary, LoadReport, SummaryFilter, SummaryKey, UpsertOutcome};
