mod category;
mod charge;
mod ids;
mod summary;
mod totals;
mod user;

pub use category::{Category, NewCategory};
pub use charge::{Charge, ChargeUpdate};
pub use ids::{CategoryId, ChargeId, CredentialId, UserId};
pub use summary::{InvariantViolation, Summary};
pub use totals::CategoryTotals;
pub use user::{NewUser, User};
