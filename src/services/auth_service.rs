use crate::auth::{normalize_email, validate_name, validate_password};
use crate::crypto;
use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::repositories::{SessionRepository, UserRepository};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

const BAD_CREDENTIALS: &str = "Invalid email or password";

/// Email + password accounts with opaque session tokens
pub struct AuthService {
    users: Arc<UserRepository>,
    sessions: Arc<SessionRepository>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(users: Arc<UserRepository>, sessions: Arc<SessionRepository>, session_ttl_hours: i64) -> Self {
        Self {
            users,
            sessions,
            session_ttl: Duration::hours(session_ttl_hours),
        }
    }

    pub fn session_ttl_secs(&self) -> i64 {
        self.session_ttl.num_seconds()
    }

    pub async fn register(&self, email: &str, name: &str, password: &str) -> AppResult<User> {
        let email = normalize_email(email)?;
        let name = validate_name(name)?;
        validate_password(password)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let (hash, salt) = crypto::hash_password(password)?;
        let user = self.users.create(&email, &name, &hash, &salt).await.map_err(|e| {
            match AppError::from(e) {
                AppError::Conflict(_) => AppError::Conflict("Email is already registered".to_string()),
                other => other,
            }
        })?;

        info!("Registered user {} ({})", user.id, user.email);
        Ok(user)
    }

    /// Returns the user and a fresh raw session token
    pub async fn login(&self, email: &str, password: &str) -> AppResult<(User, String)> {
        let email = normalize_email(email)
            .map_err(|_| AppError::Unauthorized(BAD_CREDENTIALS.to_string()))?;

        let user = match self.users.find_by_email(&email).await? {
            Some(user) if crypto::verify_password(password, &user.password_hash, &user.password_salt) => user,
            _ => {
                warn!("Failed login for {}", email);
                return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
            }
        };

        let token = crypto::generate_token()?;
        let expires_at = Utc::now().naive_utc() + self.session_ttl;
        self.sessions
            .create(user.id, &crypto::hash_token(&token), expires_at)
            .await?;

        info!("User {} logged in", user.id);
        Ok((user, token))
    }

    pub async fn logout(&self, token: &str) -> AppResult<()> {
        self.sessions
            .delete_by_token_hash(&crypto::hash_token(token))
            .await?;
        Ok(())
    }

    /// Resolve a raw session token to its user
    pub async fn authenticate(&self, token: &str) -> AppResult<User> {
        let unauthorized = || AppError::Unauthorized("Invalid or expired session".to_string());

        let session = self
            .sessions
            .find_by_token_hash(&crypto::hash_token(token))
            .await?
            .ok_or_else(unauthorized)?;

        if session.is_expired(Utc::now().naive_utc()) {
            self.sessions.delete_by_token_hash(&session.token_hash).await?;
            return Err(unauthorized());
        }

        self.users
            .find_by_id(session.user_id)
            .await?
            .ok_or_else(unauthorized)
    }

    pub async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let Ok(email) = normalize_email(email) else {
            return Ok(None);
        };
        Ok(self.users.find_by_email(&email).await?)
    }

    pub async fn purge_expired_sessions(&self) -> AppResult<u64> {
        Ok(self.sessions.delete_expired(Utc::now().naive_utc()).await?)
    }
}
