//! In-memory document backend.
//!
//! Users, categories and charges live in separate collections, each behind
//! its own lock. Nothing spans collections, so a recompute here is a sequence
//! of independent writes: [`Consistency::BestEffort`].

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::time::Instant;

use super::{AmountUpdate, Consistency, RecordStore, StoreSession, SummaryStore};
use crate::error::{StoreError, SummaryError};
use crate::models::*;

/// Store operations that a [`FaultPlan`] can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AggregateCharges,
    FindCategoryIds,
    BulkWrite,
    AggregateCategories,
    UpdateUser,
    FindUser,
    FindCategories,
    FindCharges,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AggregateCharges => "aggregate charges",
            Self::FindCategoryIds => "find category ids",
            Self::BulkWrite => "bulk write",
            Self::AggregateCategories => "aggregate categories",
            Self::UpdateUser => "update user",
            Self::FindUser => "find user",
            Self::FindCategories => "find categories",
            Self::FindCharges => "find charges",
        }
    }
}

#[derive(Debug, Default)]
struct FaultPlan {
    fail_once: HashSet<Operation>,
    interrupt_bulk_after: Option<usize>,
}

#[derive(Default)]
pub struct DocumentStore {
    users: RwLock<IndexMap<UserId, User>>,
    categories: RwLock<IndexMap<CategoryId, Category>>,
    charges: RwLock<IndexMap<ChargeId, Charge>>,
    faults: Mutex<FaultPlan>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call of `op` fail with [`StoreError::Unavailable`].
    pub fn fail_next(&self, op: Operation) {
        self.faults.lock().fail_once.insert(op);
    }

    /// Makes the next bulk write with more than `applied` operations stop
    /// after `applied` of them. Shorter batches leave the fault armed.
    pub fn interrupt_next_bulk_write(&self, applied: usize) {
        self.faults.lock().interrupt_bulk_after = Some(applied);
    }

    fn trip(&self, op: Operation) -> Result<(), StoreError> {
        if self.faults.lock().fail_once.remove(&op) {
            return Err(StoreError::Unavailable(format!("{} failed", op.as_str())));
        }
        Ok(())
    }

    /// Applies update-one operations in order. Each write is atomic on its
    /// own; the batch as a whole is not.
    fn bulk_write(&self, user_id: UserId, updates: &[AmountUpdate]) -> Result<usize, StoreError> {
        self.trip(Operation::BulkWrite)?;
        let interrupt_at = {
            let mut faults = self.faults.lock();
            match faults.interrupt_bulk_after {
                Some(n) if n < updates.len() => faults.interrupt_bulk_after.take(),
                _ => None,
            }
        };
        let mut categories = self.categories.write();
        let mut matched = 0;
        for (applied, update) in updates.iter().enumerate() {
            if interrupt_at == Some(applied) {
                return Err(StoreError::BatchInterrupted {
                    applied,
                    expected: updates.len(),
                    reason: "connection reset".into(),
                });
            }
            if let Some(category) = categories
                .get_mut(&update.category_id)
                .filter(|c| c.user_id == user_id)
            {
                category.amount = update.amount;
                matched += 1;
            }
        }
        Ok(matched)
    }

    #[cfg(test)]
    pub(crate) fn set_category_amount(&self, category_id: CategoryId, amount: Decimal) {
        if let Some(category) = self.categories.write().get_mut(&category_id) {
            category.amount = amount;
        }
    }
}

impl SummaryStore for DocumentStore {
    fn consistency(&self) -> Consistency {
        Consistency::BestEffort
    }

    fn with_transaction<T, F>(&self, _deadline: Option<Instant>, f: F) -> Result<T, SummaryError>
    where
        F: FnOnce(&mut dyn StoreSession) -> Result<T, SummaryError>,
    {
        f(&mut DocumentSession { store: self })
    }
}

struct DocumentSession<'s> {
    store: &'s DocumentStore,
}

impl StoreSession for DocumentSession<'_> {
    fn sum_charges_by_category(&mut self, user_id: UserId) -> Result<CategoryTotals, StoreError> {
        self.store.trip(Operation::AggregateCharges)?;
        let charges = self.store.charges.read();
        CategoryTotals::from_charges(charges.values().filter(|c| c.user_id == user_id))
            .ok_or_else(|| StoreError::Corrupt(format!("charge sum overflow for user {user_id}")))
    }

    fn category_ids(&mut self, user_id: UserId) -> Result<Vec<CategoryId>, StoreError> {
        self.store.trip(Operation::FindCategoryIds)?;
        Ok(self
            .store
            .categories
            .read()
            .values()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.id)
            .collect())
    }

    fn apply_category_amounts(
        &mut self,
        user_id: UserId,
        updates: &[AmountUpdate],
    ) -> Result<usize, StoreError> {
        if updates.is_empty() {
            return Ok(0);
        }
        self.store.bulk_write(user_id, updates)
    }

    fn sum_category_amounts(&mut self, user_id: UserId) -> Result<Decimal, StoreError> {
        self.store.trip(Operation::AggregateCategories)?;
        let categories = self.store.categories.read();
        categories
            .values()
            .filter(|c| c.user_id == user_id)
            .try_fold(Decimal::ZERO, |acc, c| acc.checked_add(c.amount))
            .ok_or_else(|| StoreError::Corrupt(format!("category sum overflow for user {user_id}")))
    }

    fn set_user_total(&mut self, user_id: UserId, total: Decimal) -> Result<bool, StoreError> {
        self.store.trip(Operation::UpdateUser)?;
        match self.store.users.write().get_mut(&user_id) {
            Some(user) => {
                user.total_amount = total;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn find_user(&mut self, user_id: UserId) -> Result<Option<User>, StoreError> {
        self.store.trip(Operation::FindUser)?;
        Ok(self.store.users.read().get(&user_id).cloned())
    }

    fn list_categories(&mut self, user_id: UserId) -> Result<Vec<Category>, StoreError> {
        self.store.trip(Operation::FindCategories)?;
        Ok(self
            .store
            .categories
            .read()
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    fn list_charges(&mut self, user_id: UserId) -> Result<Vec<Charge>, StoreError> {
        self.store.trip(Operation::FindCharges)?;
        Ok(self
            .store
            .charges
            .read()
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }
}

impl RecordStore for DocumentStore {
    fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let user = user.into_user();
        self.users.write().insert(user.id, user.clone());
        Ok(user)
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.users.read().values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    fn insert_category(&self, category: NewCategory) -> Result<Category, StoreError> {
        let category = category.into_category();
        self.categories.write().insert(category.id, category.clone());
        Ok(category)
    }

    fn insert_charge(&self, charge: &Charge) -> Result<(), StoreError> {
        self.charges.write().insert(charge.id, charge.clone());
        Ok(())
    }

    fn update_charge(
        &self,
        user_id: UserId,
        charge_id: ChargeId,
        update: &ChargeUpdate,
    ) -> Result<bool, StoreError> {
        let mut charges = self.charges.write();
        let Some(charge) = charges
            .get_mut(&charge_id)
            .filter(|c| c.user_id == user_id)
        else {
            return Ok(false);
        };
        charge.category_id = update.category_id;
        charge.description = update.description.clone();
        charge.amount = update.amount;
        charge.date = update.date;
        Ok(true)
    }

    fn delete_charge(&self, user_id: UserId, charge_id: ChargeId) -> Result<bool, StoreError> {
        let mut charges = self.charges.write();
        if charges.get(&charge_id).is_some_and(|c| c.user_id == user_id) {
            charges.shift_remove(&charge_id);
            return Ok(true);
        }
        Ok(false)
    }

    fn delete_category(
        &self,
        user_id: UserId,
        category_id: CategoryId,
    ) -> Result<bool, StoreError> {
        self.charges
            .write()
            .retain(|_, c| !(c.category_id == category_id && c.user_id == user_id));
        let mut categories = self.categories.write();
        if categories
            .get(&category_id)
            .is_some_and(|c| c.user_id == user_id)
        {
            categories.shift_remove(&category_id);
            return Ok(true);
        }
        Ok(false)
    }
}
