use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Room model representing a shared household
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Join code sealed with the server key; revealed on request to admins
    #[serde(skip_serializing, default)]
    pub join_code_enc: String,
    #[serde(skip_serializing, default)]
    pub join_code_hash: String,
    /// UTC hour after which members can no longer change today's meals
    pub meal_cutoff_hour: i16,
    /// Maximum guest meals a member may host per day
    pub guest_meal_limit: i16,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A room as seen from one member's room list
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoomOverview {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub role: String,
    pub member_count: i64,
    pub created_at: NaiveDateTime,
}

impl Room {
    pub const MAX_NAME_LEN: usize = 80;
    pub const MAX_GUEST_MEAL_LIMIT: i16 = 20;
}
