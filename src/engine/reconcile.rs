use rust_decimal::Decimal;

use crate::error::{StoreError, SummaryError};
use crate::models::{CategoryId, CategoryTotals, UserId};
use crate::store::{AmountUpdate, StoreSession};

/// The single bulk write that brings every owned category's cached amount in
/// line with the aggregated charge totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileBatch {
    updates: Vec<AmountUpdate>,
    orphaned: Vec<CategoryId>,
}

impl ReconcileBatch {
    /// One update per owned category: its charge total if it has charges,
    /// zero otherwise. Totals for categories the user does not own are not
    /// written, only recorded in [`ReconcileBatch::orphaned`].
    pub fn plan(owned: &[CategoryId], totals: &CategoryTotals) -> Self {
        let updates = owned
            .iter()
            .map(|&category_id| AmountUpdate {
                category_id,
                amount: totals.get(&category_id).unwrap_or(Decimal::ZERO),
            })
            .collect();
        let orphaned = totals
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| !owned.contains(id))
            .collect();
        Self { updates, orphaned }
    }

    pub fn updates(&self) -> &[AmountUpdate] {
        &self.updates
    }

    /// Categories that have charges for this user but are not owned by them.
    pub fn orphaned(&self) -> &[CategoryId] {
        &self.orphaned
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Overwrites every owned category's cached amount.
///
/// A bulk write that stops part-way is reported as
/// [`SummaryError::PartialReconciliation`]: the categories written before the
/// fault are fresh, the rest are stale.
pub(crate) fn reconcile(
    session: &mut dyn StoreSession,
    user_id: UserId,
    totals: &CategoryTotals,
) -> Result<ReconcileBatch, SummaryError> {
    let owned = session.category_ids(user_id)?;
    let batch = ReconcileBatch::plan(&owned, totals);
    if !batch.orphaned().is_empty() {
        tracing::warn!(
            orphaned = ?batch.orphaned(),
            "charges reference categories the user does not own"
        );
    }
    if batch.is_empty() {
        return Ok(batch);
    }

    let matched = match session.apply_category_amounts(user_id, batch.updates()) {
        Ok(matched) => matched,
        Err(StoreError::BatchInterrupted {
            applied, expected, ..
        }) => return Err(SummaryError::PartialReconciliation { applied, expected }),
        Err(e) => return Err(e.into()),
    };
    if matched < batch.len() {
        // Only possible when a category is deleted mid-run; the rest are fresh.
        tracing::warn!(
            matched,
            expected = batch.len(),
            "categories vanished during reconciliation"
        );
    }
    tracing::debug!(updated = matched, "reconciled category amounts");
    Ok(batch)
}
