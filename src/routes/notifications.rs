use super::auth::AuthUser;
use crate::error::AppResult;
use crate::models::Notification;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub unread_only: Option<bool>,
    pub limit: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let unread_only = query.unread_only.unwrap_or(false);
    Ok(Json(
        state
            .notifications
            .list(caller.user.id, unread_only, query.limit)
            .await?,
    ))
}

pub async fn unread_count(State(state): State<AppState>, caller: AuthUser) -> AppResult<Json<Value>> {
    let count = state.notifications.unread_count(caller.user.id).await?;
    Ok(Json(json!({ "unread": count })))
}

pub async fn mark_all_read(State(state): State<AppState>, caller: AuthUser) -> AppResult<Json<Value>> {
    let updated = state.notifications.mark_all_read(caller.user.id).await?;
    Ok(Json(json!({ "updated": updated })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.notifications.mark_read(caller.user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.notifications.delete(caller.user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
