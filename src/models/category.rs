use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CategoryId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub user_id: UserId,
    pub title: String,
    pub allotment: Decimal,
    /// Materialized sum of this category's charges. Overwritten by every
    /// recompute; never edited directly.
    pub amount: Decimal,
}

impl Category {
    /// Allotment left after spending; negative when over budget.
    pub fn remaining(&self) -> Decimal {
        self.allotment - self.amount
    }

    pub fn is_over_budget(&self) -> bool {
        self.amount > self.allotment
    }

    /// Find a category by ID in a slice.
    pub fn find_by_id(categories: &[Category], id: CategoryId) -> Option<&Category> {
        categories.iter().find(|c| c.id == id)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title)
    }
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub id: CategoryId,
    pub user_id: UserId,
    pub title: String,
    pub allotment: Decimal,
}

impl NewCategory {
    pub fn new(user_id: UserId, title: String, allotment: Decimal) -> Self {
        Self {
            id: CategoryId::new(),
            user_id,
            title,
            allotment,
        }
    }

    pub(crate) fn into_category(self) -> Category {
        Category {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            allotment: self.allotment,
            amount: Decimal::ZERO,
        }
    }
}
