use rust_decimal::Decimal;

use crate::error::SummaryError;
use crate::models::UserId;
use crate::store::StoreSession;

/// Rewrites the user's total from the freshly reconciled category amounts.
///
/// A missing user is not an error here; the assembler's read-back reports it.
pub(crate) fn recalculate(
    session: &mut dyn StoreSession,
    user_id: UserId,
) -> Result<Decimal, SummaryError> {
    let total = session.sum_category_amounts(user_id)?;
    if !session.set_user_total(user_id, total)? {
        tracing::debug!("no user record matched the total update");
    }
    Ok(total)
}
