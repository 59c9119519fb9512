use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CredentialId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub credential_id: CredentialId,
    pub name: String,
    /// Materialized sum of the user's category amounts. Only trustworthy right
    /// after a recompute; any charge mutation makes it stale until the next one.
    pub total_amount: Decimal,
    pub total_allotment: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: UserId,
    pub credential_id: CredentialId,
    pub name: String,
    pub total_allotment: Decimal,
}

impl NewUser {
    pub fn new(name: String, total_allotment: Decimal) -> Self {
        Self {
            id: UserId::new(),
            credential_id: CredentialId::new(),
            name,
            total_allotment,
        }
    }

    pub(crate) fn into_user(self) -> User {
        User {
            id: self.id,
            credential_id: self.credential_id,
            name: self.name,
            total_amount: Decimal::ZERO,
            total_allotment: self.total_allotment,
        }
    }
}
