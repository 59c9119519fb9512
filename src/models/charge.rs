use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CategoryId, ChargeId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Charge {
    pub id: ChargeId,
    pub user_id: UserId,
    pub category_id: CategoryId,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
}

impl Charge {
    pub fn new(
        user_id: UserId,
        category_id: CategoryId,
        description: String,
        amount: Decimal,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: ChargeId::new(),
            user_id,
            category_id,
            description,
            amount,
            date,
        }
    }

    /// Same as [`Charge::new`] but dated today (local time).
    pub fn today(
        user_id: UserId,
        category_id: CategoryId,
        description: String,
        amount: Decimal,
    ) -> Self {
        let date = chrono::Local::now().date_naive();
        Self::new(user_id, category_id, description, amount, date)
    }
}

/// Fields a charge update may change. Owner and id are fixed.
#[derive(Debug, Clone)]
pub struct ChargeUpdate {
    pub category_id: CategoryId,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
}
