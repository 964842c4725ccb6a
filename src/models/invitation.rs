use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invitation link into a room; only the token hash is persisted
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InviteToken {
    pub id: Uuid,
    pub room_id: Uuid,
    /// When set, only the user with this email may accept
    pub email: Option<String>,
    pub role: String,
    #[serde(skip_serializing, default)]
    pub token_hash: String,
    pub max_uses: i32,
    pub uses: i32,
    pub expires_at: NaiveDateTime,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
}

impl InviteToken {
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.expires_at <= now
    }

    pub fn is_exhausted(&self) -> bool {
        self.uses >= self.max_uses
    }

    /// Whether `email` may use this invitation
    pub fn accepts_email(&self, email: &str) -> bool {
        self.email
            .as_deref()
            .map_or(true, |bound| bound.eq_ignore_ascii_case(email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite(email: Option<&str>, uses: i32) -> InviteToken {
        let now = chrono::Utc::now().naive_utc();
        InviteToken {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            email: email.map(String::from),
            role: "member".into(),
            token_hash: String::new(),
            max_uses: 2,
            uses,
            expires_at: now + chrono::Duration::hours(1),
            created_by: Uuid::new_v4(),
            created_at: now,
        }
    }

    #[test]
    fn test_email_binding_is_case_insensitive() {
        let inv = invite(Some("Roommate@Example.com"), 0);
        assert!(inv.accepts_email("roommate@example.com"));
        assert!(!inv.accepts_email("other@example.com"));
        assert!(invite(None, 0).accepts_email("anyone@example.com"));
    }

    #[test]
    fn test_exhaustion() {
        assert!(!invite(None, 1).is_exhausted());
        assert!(invite(None, 2).is_exhausted());
    }
}
