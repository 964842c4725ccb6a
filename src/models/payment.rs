use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

text_enum! {
    pub enum PaymentMethod {
        Cash => "cash",
        Bank => "bank",
        Mobile => "mobile",
        Other => "other",
    }
}

text_enum! {
    /// Shared non-meal costs, split equally between participants
    pub enum ExpenseCategory {
        Utilities => "utilities",
        Rent => "rent",
        Maintenance => "maintenance",
        Internet => "internet",
        Other => "other",
    }
}

text_enum! {
    /// Manual ledger entries against a member's balance
    pub enum TransactionKind {
        Adjustment => "adjustment",
        Refund => "refund",
        CarryForward => "carry_forward",
    }
}

/// Money a member paid into the shared fund
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub room_id: Uuid,
    pub period_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub method: String,
    pub note: Option<String>,
    pub paid_on: NaiveDate,
    pub recorded_by: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExtraExpense {
    pub id: Uuid,
    pub room_id: Uuid,
    pub period_id: Uuid,
    pub category: String,
    pub description: String,
    pub amount: Decimal,
    pub spent_on: NaiveDate,
    pub recorded_by: Uuid,
    pub created_at: NaiveDateTime,
}

/// Signed ledger entry; positive amounts credit the member
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccountTransaction {
    pub id: Uuid,
    pub room_id: Uuid,
    pub period_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub kind: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
}

impl TransactionKind {
    /// Apply the sign convention for this kind: refunds always debit
    pub fn signed_amount(&self, amount: Decimal) -> Decimal {
        match self {
            TransactionKind::Refund => -amount.abs(),
            TransactionKind::Adjustment | TransactionKind::CarryForward => amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refund_is_always_negative() {
        let amount = Decimal::new(2500, 2);
        assert_eq!(TransactionKind::Refund.signed_amount(amount), -amount);
        assert_eq!(TransactionKind::Refund.signed_amount(-amount), -amount);
        assert_eq!(TransactionKind::Adjustment.signed_amount(-amount), -amount);
    }

    #[test]
    fn test_carry_forward_spelling() {
        assert_eq!(TransactionKind::CarryForward.as_str(), "carry_forward");
        assert_eq!(
            "carry_forward".parse::<TransactionKind>().unwrap(),
            TransactionKind::CarryForward
        );
    }
}
