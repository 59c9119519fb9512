use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::{CategoryId, Charge};

/// Per-category charge sums for one user.
///
/// A category with no charges has no entry at all. A category whose charges
/// cancel out has an explicit zero entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTotals(BTreeMap<CategoryId, Decimal>);

impl CategoryTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds charges into per-category sums. Returns `None` on decimal overflow.
    pub fn from_charges<'a>(charges: impl IntoIterator<Item = &'a Charge>) -> Option<Self> {
        let mut totals = Self::new();
        for charge in charges {
            totals.add(charge.category_id, charge.amount)?;
        }
        Some(totals)
    }

    /// Adds `amount` to the running sum of `category_id`. Returns `None` on overflow.
    pub fn add(&mut self, category_id: CategoryId, amount: Decimal) -> Option<()> {
        let entry = self.0.entry(category_id).or_insert(Decimal::ZERO);
        *entry = entry.checked_add(amount)?;
        Some(())
    }

    pub fn get(&self, category_id: &CategoryId) -> Option<Decimal> {
        self.0.get(category_id).copied()
    }

    pub fn contains(&self, category_id: &CategoryId) -> bool {
        self.0.contains_key(category_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CategoryId, &Decimal)> {
        self.0.iter()
    }
}

impl FromIterator<(CategoryId, Decimal)> for CategoryTotals {
    fn from_iter<I: IntoIterator<Item = (CategoryId, Decimal)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
