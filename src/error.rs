use thiserror::Error;

use crate::engine::Stage;

/// Failures raised by a backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[source] rusqlite::Error),
    /// A stored value could not be decoded (e.g. a malformed decimal column).
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A bulk write stopped part-way; the first `applied` writes persist.
    #[error("bulk write interrupted after {applied} of {expected} operations: {reason}")]
    BatchInterrupted {
        applied: usize,
        expected: usize,
        reason: String,
    },
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::FromSqlConversionFailure(column, _, source) => {
                StoreError::Corrupt(format!("column {column}: {source}"))
            }
            rusqlite::Error::UserFunctionError(source) => StoreError::Corrupt(source.to_string()),
            _ => {
                tracing::error!("an unhandled SQL error occurred: {}", value);
                StoreError::Sqlite(value)
            }
        }
    }
}

/// Outcome of a failed summary recompute. One per invocation.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("invalid user id: {0:?}")]
    InvalidId(String),
    #[error("user not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("category reconciliation applied {applied} of {expected} updates")]
    PartialReconciliation { applied: usize, expected: usize },
    #[error("request cancelled after stage {0}")]
    Cancelled(Stage),
    #[error("request deadline exceeded after stage {0}")]
    DeadlineExceeded(Stage),
}

impl SummaryError {
    /// Status the summary HTTP handler answers with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidId(_) => 400,
            Self::NotFound(_) => 404,
            Self::Store(_) | Self::PartialReconciliation { .. } => 500,
            Self::Cancelled(_) => 499,
            Self::DeadlineExceeded(_) => 504,
        }
    }

    /// Whether the failure left cached aggregates inconsistent in the store.
    pub fn is_alertable(&self) -> bool {
        matches!(self, Self::PartialReconciliation { .. })
    }
}
