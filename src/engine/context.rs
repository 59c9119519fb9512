use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Stage;
use crate::error::SummaryError;

/// Deadline and cancellation inherited from the caller's request.
///
/// Both are only observed between pipeline stages. A stage that has started
/// always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

/// Cancels the [`RequestContext`] it was taken from, from any thread.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
            ..Self::default()
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::default()
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancelled))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Called after `completed` finishes; fails if the request was abandoned.
    pub(crate) fn checkpoint(&self, completed: Stage) -> Result<(), SummaryError> {
        if self.is_cancelled() {
            return Err(SummaryError::Cancelled(completed));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(SummaryError::DeadlineExceeded(completed));
        }
        tracing::debug!(stage = %completed, "stage complete");
        Ok(())
    }
}
