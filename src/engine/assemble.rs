use crate::error::SummaryError;
use crate::models::{Summary, UserId};
use crate::store::StoreSession;

/// Reads the user, categories and charges back through the same session
/// that wrote them.
pub(crate) fn assemble(
    session: &mut dyn StoreSession,
    user_id: UserId,
) -> Result<Summary, SummaryError> {
    let user = session
        .find_user(user_id)?
        .ok_or_else(|| SummaryError::NotFound(user_id.to_string()))?;
    let categories = session.list_categories(user_id)?;
    let charges = session.list_charges(user_id)?;
    Ok(Summary {
        user,
        categories,
        charges,
    })
}
