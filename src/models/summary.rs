use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Category, CategoryId, CategoryTotals, Charge, User};

/// The composed user + categories + charges snapshot returned by one recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub user: User,
    pub categories: Vec<Category>,
    pub charges: Vec<Charge>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    CategoryAmount {
        category_id: CategoryId,
        cached: Decimal,
        computed: Decimal,
    },
    UserTotal {
        cached: Decimal,
        computed: Decimal,
    },
    /// A charge or category sum does not fit in a `Decimal`.
    Overflow,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CategoryAmount {
                category_id,
                cached,
                computed,
            } => write!(
                f,
                "category {category_id} caches {cached} but its charges sum to {computed}"
            ),
            Self::UserTotal { cached, computed } => write!(
                f,
                "user total is {cached} but categories sum to {computed}"
            ),
            Self::Overflow => write!(f, "amounts overflow when summed"),
        }
    }
}

impl Summary {
    /// Checks the cached fields against the snapshot's own charges.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let totals =
            CategoryTotals::from_charges(&self.charges).ok_or(InvariantViolation::Overflow)?;
        let mut category_sum = Decimal::ZERO;
        for category in &self.categories {
            let computed = totals.get(&category.id).unwrap_or(Decimal::ZERO);
            if category.amount != computed {
                return Err(InvariantViolation::CategoryAmount {
                    category_id: category.id,
                    cached: category.amount,
                    computed,
                });
            }
            category_sum = category_sum
                .checked_add(category.amount)
                .ok_or(InvariantViolation::Overflow)?;
        }
        if self.user.total_amount != category_sum {
            return Err(InvariantViolation::UserTotal {
                cached: self.user.total_amount,
                computed: category_sum,
            });
        }
        Ok(())
    }

    pub fn total_remaining(&self) -> Decimal {
        self.user.total_allotment - self.user.total_amount
    }

    pub fn charges_for(&self, category_id: CategoryId) -> impl Iterator<Item = &Charge> {
        self.charges
            .iter()
            .filter(move |c| c.category_id == category_id)
    }
}
