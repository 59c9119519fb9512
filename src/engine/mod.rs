//! Summary recompute: aggregate charges, reconcile category amounts,
//! recalculate the user total, then read everything back.
//!
//! All four steps run inside the store's atomicity boundary, strictly in
//! order, for one user per call. The engine holds no mutable state, so calls
//! for different users can run in parallel on a shared engine.

mod aggregate;
mod assemble;
mod context;
mod recalculate;
mod reconcile;

use std::time::Duration;

use crate::error::SummaryError;
use crate::models::{Summary, UserId};
use crate::store::{Consistency, StoreSession, SummaryStore};

pub use context::{CancelHandle, RequestContext};
pub use reconcile::ReconcileBatch;

/// Pipeline progress of one recompute. `Failed` is the `Err` side of the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Aggregated,
    Reconciled,
    Recalculated,
    Assembled,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Aggregated => "aggregated",
            Self::Reconciled => "reconciled",
            Self::Recalculated => "recalculated",
            Self::Assembled => "assembled",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub struct SummaryEngine<S> {
    store: S,
    request_timeout: Option<Duration>,
}

impl<S: SummaryStore> SummaryEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            request_timeout: None,
        }
    }

    /// Deadline applied by [`SummaryEngine::recompute_summary`].
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn consistency(&self) -> Consistency {
        self.store.consistency()
    }

    pub fn recompute_summary(&self, user_id: &str) -> Result<Summary, SummaryError> {
        let ctx = match self.request_timeout {
            Some(timeout) => RequestContext::with_timeout(timeout),
            None => RequestContext::new(),
        };
        self.recompute_summary_with(&ctx, user_id)
    }

    /// Recomputes every cached amount for `user_id` and returns the
    /// resulting snapshot.
    ///
    /// The id is validated before any store access. On a transactional
    /// store a failure leaves nothing behind; on a best-effort store the
    /// steps that completed stay applied and the next successful call
    /// overwrites them.
    pub fn recompute_summary_with(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> Result<Summary, SummaryError> {
        let user_id = parse_user_id(user_id)?;
        let consistency = self.store.consistency();
        let span = tracing::info_span!("recompute_summary", %user_id, %consistency);
        let _entered = span.enter();

        let result = self
            .store
            .with_transaction(ctx.deadline(), |session| run_pipeline(ctx, session, user_id));

        match &result {
            Ok(summary) => {
                if consistency == Consistency::BestEffort {
                    if let Err(violation) = summary.check_invariants() {
                        tracing::warn!(%violation, "summary raced a concurrent writer");
                    }
                }
                tracing::debug!(stage = %Stage::Done, total = %summary.user.total_amount, "summary ready");
            }
            Err(err) if err.is_alertable() => {
                tracing::error!(error = %err, "category amounts left inconsistent");
            }
            Err(err @ SummaryError::NotFound(_)) => tracing::warn!(error = %err, "no such user"),
            Err(err) => tracing::error!(error = %err, "summary recompute failed"),
        }
        result
    }
}

fn parse_user_id(raw: &str) -> Result<UserId, SummaryError> {
    raw.parse()
        .map_err(|_| SummaryError::InvalidId(raw.to_string()))
}

fn run_pipeline(
    ctx: &RequestContext,
    session: &mut dyn StoreSession,
    user_id: UserId,
) -> Result<Summary, SummaryError> {
    ctx.checkpoint(Stage::Start)?;
    let totals = aggregate::aggregate(session, user_id)?;
    ctx.checkpoint(Stage::Aggregated)?;
    reconcile::reconcile(session, user_id, &totals)?;
    ctx.checkpoint(Stage::Reconciled)?;
    recalculate::recalculate(session, user_id)?;
    ctx.checkpoint(Stage::Recalculated)?;
    let summary = assemble::assemble(session, user_id)?;
    tracing::debug!(stage = %Stage::Assembled, "stage complete");
    Ok(summary)
}
