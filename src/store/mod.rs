//! Storage backends for users, categories and charges.
//!
//! Two backends exist with different guarantees: [`SqliteStore`] runs every
//! recompute inside one immediate transaction, [`DocumentStore`] applies each
//! step as its own write with no cross-collection atomicity. Callers learn
//! which one they have from [`SummaryStore::consistency`].

pub mod document;
pub mod sqlite;

use rust_decimal::Decimal;
use std::time::Instant;

use crate::error::{StoreError, SummaryError};
use crate::models::*;

pub use document::{DocumentStore, Operation};
pub use sqlite::SqliteStore;

/// Consistency a store actually provides around one recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    /// All steps commit or roll back together; same-user recomputes serialize.
    Transactional,
    /// Steps apply one by one. A failure or a concurrent recompute can leave
    /// cached amounts stale until the next successful run.
    BestEffort,
}

impl Consistency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transactional => "transactional",
            Self::BestEffort => "best-effort",
        }
    }
}

impl std::fmt::Display for Consistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One cached-amount overwrite produced by reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountUpdate {
    pub category_id: CategoryId,
    pub amount: Decimal,
}

/// Reads and writes available to a recompute. Every call is scoped to one
/// user and must filter on that user id.
pub trait StoreSession {
    /// Sum of charge amounts per category. Categories without charges are absent.
    fn sum_charges_by_category(&mut self, user_id: UserId) -> Result<CategoryTotals, StoreError>;

    /// Ids of every category the user owns.
    fn category_ids(&mut self, user_id: UserId) -> Result<Vec<CategoryId>, StoreError>;

    /// Applies the batch as one bulk write. Returns how many updates matched.
    fn apply_category_amounts(
        &mut self,
        user_id: UserId,
        updates: &[AmountUpdate],
    ) -> Result<usize, StoreError>;

    /// Sum of the user's category amounts, zero when there are none.
    fn sum_category_amounts(&mut self, user_id: UserId) -> Result<Decimal, StoreError>;

    /// Writes the user's total. Returns false when no user record matched.
    fn set_user_total(&mut self, user_id: UserId, total: Decimal) -> Result<bool, StoreError>;

    fn find_user(&mut self, user_id: UserId) -> Result<Option<User>, StoreError>;

    fn list_categories(&mut self, user_id: UserId) -> Result<Vec<Category>, StoreError>;

    fn list_charges(&mut self, user_id: UserId) -> Result<Vec<Charge>, StoreError>;
}

/// A store that can host a summary recompute.
pub trait SummaryStore: Send + Sync {
    fn consistency(&self) -> Consistency;

    /// Runs `f` inside the store's atomicity boundary.
    ///
    /// Transactional stores commit when `f` returns `Ok` and roll back
    /// otherwise. Best-effort stores call `f` directly; whatever `f` wrote
    /// before failing stays written.
    ///
    /// A store that has to wait before it can start `f` gives up at
    /// `deadline` with [`SummaryError::DeadlineExceeded`] at [`Stage::Start`].
    ///
    /// [`Stage::Start`]: crate::engine::Stage::Start
    fn with_transaction<T, F>(&self, deadline: Option<Instant>, f: F) -> Result<T, SummaryError>
    where
        F: FnOnce(&mut dyn StoreSession) -> Result<T, SummaryError>;
}

/// Plain record CRUD used by the surrounding application.
pub trait RecordStore {
    fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    fn list_users(&self) -> Result<Vec<User>, StoreError>;

    fn insert_category(&self, category: NewCategory) -> Result<Category, StoreError>;

    fn insert_charge(&self, charge: &Charge) -> Result<(), StoreError>;

    /// Returns false when no charge with that id belongs to the user.
    fn update_charge(
        &self,
        user_id: UserId,
        charge_id: ChargeId,
        update: &ChargeUpdate,
    ) -> Result<bool, StoreError>;

    fn delete_charge(&self, user_id: UserId, charge_id: ChargeId) -> Result<bool, StoreError>;

    /// Deletes the category and every charge filed under it.
    fn delete_category(&self, user_id: UserId, category_id: CategoryId)
        -> Result<bool, StoreError>;
}
