use super::auth::AuthUser;
use super::optional_json;
use crate::accounting::PeriodSummary;
use crate::error::AppResult;
use crate::models::MealPeriod;
use crate::services::period_service::NewPeriod;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct EndPeriodRequest {
    pub end_date: Option<NaiveDate>,
}

pub async fn list_periods(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<Vec<MealPeriod>>> {
    Ok(Json(state.periods.list_periods(room_id, caller.user.id).await?))
}

/// Body is optional; every field has a default
pub async fn start_period(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<MealPeriod>)> {
    let req: NewPeriod = optional_json(&body)?;
    let period = state.periods.start_period(room_id, caller.user.id, &req).await?;
    Ok((StatusCode::CREATED, Json(period)))
}

pub async fn current_period(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<Option<MealPeriod>>> {
    Ok(Json(state.periods.current_period(room_id, caller.user.id).await?))
}

pub async fn get_period(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, period_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<MealPeriod>> {
    Ok(Json(
        state
            .periods
            .get_period(room_id, caller.user.id, period_id)
            .await?,
    ))
}

pub async fn end_period(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, period_id)): Path<(Uuid, Uuid)>,
    body: Bytes,
) -> AppResult<Json<MealPeriod>> {
    let req: EndPeriodRequest = optional_json(&body)?;
    Ok(Json(
        state
            .periods
            .end_period(room_id, caller.user.id, period_id, req.end_date)
            .await?,
    ))
}

pub async fn lock_period(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, period_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<MealPeriod>> {
    Ok(Json(
        state
            .periods
            .lock_period(room_id, caller.user.id, period_id)
            .await?,
    ))
}

pub async fn unlock_period(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, period_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<MealPeriod>> {
    Ok(Json(
        state
            .periods
            .unlock_period(room_id, caller.user.id, period_id)
            .await?,
    ))
}

pub async fn archive_period(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, period_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<MealPeriod>> {
    Ok(Json(
        state
            .periods
            .archive_period(room_id, caller.user.id, period_id)
            .await?,
    ))
}

pub async fn period_summary(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, period_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<PeriodSummary>> {
    Ok(Json(
        state
            .periods
            .period_summary(room_id, caller.user.id, period_id)
            .await?,
    ))
}
