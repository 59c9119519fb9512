use crate::error::SummaryError;
use crate::models::{CategoryTotals, UserId};
use crate::store::StoreSession;

/// Sums the user's charges per category. Categories without charges are
/// absent from the result.
pub(crate) fn aggregate(
    session: &mut dyn StoreSession,
    user_id: UserId,
) -> Result<CategoryTotals, SummaryError> {
    let totals = session.sum_charges_by_category(user_id)?;
    tracing::debug!(categories_with_charges = totals.len(), "aggregated charges");
    Ok(totals)
}
