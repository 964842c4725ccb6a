use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Grocery purchase; approved items make up the period's meal cost
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShoppingItem {
    pub id: Uuid,
    pub room_id: Uuid,
    pub period_id: Uuid,
    pub purchased_by: Uuid,
    pub purchase_date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub approved: bool,
    pub approved_by: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
}

/// A member's scheduled turn to do the market run
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MarketDate {
    pub id: Uuid,
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub market_date: NaiveDate,
    pub completed: bool,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
}
