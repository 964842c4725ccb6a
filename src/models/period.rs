use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

text_enum! {
    /// Lifecycle of a billing period
    pub enum PeriodStatus {
        Active => "active",
        Ended => "ended",
        Locked => "locked",
        Archived => "archived",
    }
}

/// Meal period: the date range over which costs are aggregated
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealPeriod {
    pub id: Uuid,
    pub room_id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: String,
    pub opening_balance: Decimal,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
}

impl MealPeriod {
    pub fn status_enum(&self) -> PeriodStatus {
        self.status.parse().unwrap_or(PeriodStatus::Archived)
    }

    /// Only active periods accept new meals, purchases and payments
    pub fn is_editable(&self) -> bool {
        self.status_enum() == PeriodStatus::Active
    }

    /// Whether `date` falls inside the period's range
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date.map_or(true, |end| date <= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(status: PeriodStatus, end: Option<NaiveDate>) -> MealPeriod {
        MealPeriod {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            name: "March".into(),
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            end_date: end,
            status: status.as_str().into(),
            opening_balance: Decimal::ZERO,
            created_by: Uuid::new_v4(),
            created_at: chrono::Utc::now().naive_utc(),
            ended_at: None,
        }
    }

    #[test]
    fn test_open_ended_period_contains_later_dates() {
        let p = period(PeriodStatus::Active, None);
        assert!(p.contains(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()));
        assert!(p.contains(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
        assert!(!p.contains(NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()));
    }

    #[test]
    fn test_closed_period_bounds() {
        let p = period(PeriodStatus::Ended, NaiveDate::from_ymd_opt(2025, 3, 31));
        assert!(p.contains(NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()));
        assert!(!p.contains(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()));
    }

    #[test]
    fn test_only_active_is_editable() {
        assert!(period(PeriodStatus::Active, None).is_editable());
        assert!(!period(PeriodStatus::Ended, None).is_editable());
        assert!(!period(PeriodStatus::Locked, None).is_editable());
        assert!(!period(PeriodStatus::Archived, None).is_editable());
    }
}
