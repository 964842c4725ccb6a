use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

text_enum! {
    /// Member role in a room
    pub enum Role {
        Admin => "admin",
        Manager => "manager",
        MealManager => "meal_manager",
        Accountant => "accountant",
        MarketManager => "market_manager",
        Member => "member",
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Role::Member)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// Room member model representing a user's membership in a room
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoomMember {
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub role: String, // Stored as TEXT in DB, use Role enum for type safety
    pub joined_at: NaiveDateTime,
}

impl RoomMember {
    /// Get the role as an enum
    pub fn role_enum(&self) -> Role {
        Role::from(self.role.clone())
    }

    /// Check if member is an admin
    pub fn is_admin(&self) -> bool {
        self.role_enum() == Role::Admin
    }
}

/// Membership joined with the user's profile, for member listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MemberDetails {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub joined_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_text() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
        assert_eq!("MEAL_MANAGER".parse::<Role>().unwrap(), Role::MealManager);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_unknown_role_text_falls_back_to_member() {
        assert_eq!(Role::from("something".to_string()), Role::Member);
    }

    #[test]
    fn test_role_serde_matches_database_spelling() {
        let json = serde_json::to_string(&Role::MarketManager).unwrap();
        assert_eq!(json, "\"market_manager\"");
    }
}
