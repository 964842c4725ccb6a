use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User account, identified by a unique lowercased email
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    #[serde(skip_serializing, default)]
    pub password_salt: String,
    pub created_at: NaiveDateTime,
}

/// Login session; only the SHA-256 of the bearer token is stored
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing, default)]
    pub token_hash: String,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl Session {
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_fields_are_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            name: "A".into(),
            password_hash: "secret-hash".into(),
            password_salt: "secret-salt".into(),
            created_at: chrono::Utc::now().naive_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("secret-salt"));
        assert!(json.contains("a@example.com"));
    }

    #[test]
    fn test_session_expiry() {
        let now = chrono::Utc::now().naive_utc();
        let session = Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: String::new(),
            expires_at: now,
            created_at: now,
        };
        assert!(session.is_expired(now));
        assert!(!session.is_expired(now - chrono::Duration::seconds(1)));
    }
}
