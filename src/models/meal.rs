use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

text_enum! {
    /// The three daily meals tracked per member
    pub enum MealType {
        Breakfast => "breakfast",
        Lunch => "lunch",
        Dinner => "dinner",
    }
}

/// One meal taken by a member; its existence means the meal counts
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Meal {
    pub id: Uuid,
    pub room_id: Uuid,
    pub period_id: Uuid,
    pub user_id: Uuid,
    pub meal_date: NaiveDate,
    pub meal_type: String,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
}

/// Meals eaten by guests, billed to the hosting member
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GuestMeal {
    pub id: Uuid,
    pub room_id: Uuid,
    pub period_id: Uuid,
    pub host_user_id: Uuid,
    pub meal_date: NaiveDate,
    pub meal_type: String,
    pub count: i32,
    pub note: Option<String>,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
}

impl Meal {
    pub fn meal_type_enum(&self) -> Option<MealType> {
        self.meal_type.parse().ok()
    }
}
