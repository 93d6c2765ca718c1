use thiserror::Error;

/// Failures reported by the event and summary stores.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached or failed as a whole. Fatal for a run.
    #[error("Store connection failure: {0}")]
    ConnectionFailure(String),

    /// The store refused a single record. The batch continues.
    #[error("Record rejected: {0}")]
    RecordRejected(String),
}

impl StoreError {
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, StoreError::ConnectionFailure(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if is_record_level(db_err.code().as_deref()) => {
                StoreError::RecordRejected(err.to_string())
            }
            sqlx::Error::Database(_)
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Configuration(_)
            | sqlx::Error::Migrate(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::TypeNotFound { .. } => StoreError::ConnectionFailure(err.to_string()),
            _ => StoreError::RecordRejected(err.to_string()),
        }
    }
}

/// SQLSTATE classes 22 (data exception) and 23 (integrity constraint violation)
/// concern the row being written. Every other class fails the store as a whole.
fn is_record_level(code: Option<&str>) -> bool {
    matches!(code, Some(code) if code.starts_with("22") || code.starts_with("23"))
}

/// A raw event that cannot be placed into any group.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Event {id} has no timestamp")]
    MissingTimestamp { id: i64 },

    #[error("Event {id} has unparseable timestamp {value:?}")]
    MalformedTimestamp { id: i64, value: String },
}

impl ValidationError {
    pub fn event_id(&self) -> i64 {
        match self {
            ValidationError::MissingTimestamp { id } => *id,
            ValidationError::MalformedTimestamp { id, .. } => *id,
        }
    }
}

/// A run that ended in the `Failed` state, tagged with the stage that failed.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Extract failed: {0}")]
    Extract(#[source] StoreError),

    #[error("Load failed: {0}")]
    Load(#[source] StoreError),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to read summaries: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to encode report file {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write report file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
