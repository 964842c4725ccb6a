use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-user count (meals eaten, guest meals hosted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserCount {
    pub user_id: Uuid,
    pub name: String,
    pub count: i64,
}

/// Per-user money total (payments)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserAmount {
    pub user_id: Uuid,
    pub name: String,
    pub amount: Decimal,
}

/// Per-user ledger total for one transaction kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserLedgerTotal {
    pub user_id: Uuid,
    pub name: String,
    pub kind: String,
    pub amount: Decimal,
}
