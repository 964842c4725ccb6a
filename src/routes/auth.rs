use crate::auth::{clear_session_cookie, extract_token, session_cookie};
use crate::error::AppError;
use crate::models::User;
use crate::AppState;
use axum::{
    extract::{FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

// ---------------------------------------------------------------------------
// Auth extractor
// ---------------------------------------------------------------------------

/// Caller resolved from the bearer token or the session cookie
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Missing session token".to_string()))?;
        let user = state.auth.authenticate(&token).await?;
        Ok(Self { user, token })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = state.auth.register(&req.email, &req.name, &req.password).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Issues the token in the body and as an HttpOnly cookie
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let (user, token) = state.auth.login(&req.email, &req.password).await?;
    let ttl = state.auth.session_ttl_secs();
    let cookie = session_cookie(&token, ttl, state.config.is_production());

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "user": user,
            "token": token,
            "expires_in": ttl,
        })),
    )
        .into_response())
}

pub async fn logout(State(state): State<AppState>, caller: AuthUser) -> Result<Response, AppError> {
    state.auth.logout(&caller.token).await?;
    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie())],
    )
        .into_response())
}

pub async fn me(caller: AuthUser) -> Json<User> {
    Json(caller.user)
}
