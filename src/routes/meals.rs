use super::auth::AuthUser;
use crate::error::AppResult;
use crate::models::{GuestMeal, Meal, MealType};
use crate::repositories::MealFilter;
use crate::services::meal_service::{MealCount, MealState, NewGuestMeal, RangeResult};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct MealQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub user_id: Option<Uuid>,
}

impl From<MealQuery> for MealFilter {
    fn from(q: MealQuery) -> Self {
        MealFilter {
            from: q.from,
            to: q.to,
            user_id: q.user_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub period_id: Option<Uuid>,
}

/// `user_id` defaults to the caller
#[derive(Debug, Deserialize)]
pub struct SetMealRequest {
    pub user_id: Option<Uuid>,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub on: bool,
}

#[derive(Debug, Deserialize)]
pub struct ToggleMealRequest {
    pub user_id: Option<Uuid>,
    pub date: NaiveDate,
    pub meal_type: MealType,
}

#[derive(Debug, Deserialize)]
pub struct MealRangeRequest {
    pub user_id: Option<Uuid>,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub meal_types: Vec<MealType>,
    pub on: bool,
}

pub async fn list_meals(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Query(query): Query<MealQuery>,
) -> AppResult<Json<Vec<Meal>>> {
    let filter = MealFilter::from(query);
    Ok(Json(state.meals.list_meals(room_id, caller.user.id, &filter).await?))
}

pub async fn set_meal(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Json(req): Json<SetMealRequest>,
) -> AppResult<Json<MealState>> {
    let target = req.user_id.unwrap_or(caller.user.id);
    let meal = state
        .meals
        .set_meal(room_id, caller.user.id, target, req.date, req.meal_type, req.on)
        .await?;
    Ok(Json(meal))
}

pub async fn toggle_meal(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Json(req): Json<ToggleMealRequest>,
) -> AppResult<Json<MealState>> {
    let target = req.user_id.unwrap_or(caller.user.id);
    let meal = state
        .meals
        .toggle_meal(room_id, caller.user.id, target, req.date, req.meal_type)
        .await?;
    Ok(Json(meal))
}

pub async fn set_meals_range(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Json(req): Json<MealRangeRequest>,
) -> AppResult<Json<RangeResult>> {
    let target = req.user_id.unwrap_or(caller.user.id);
    let result = state
        .meals
        .set_meals_range(
            room_id,
            caller.user.id,
            target,
            req.from,
            req.to,
            &req.meal_types,
            req.on,
        )
        .await?;
    Ok(Json(result))
}

pub async fn meal_counts(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<Vec<MealCount>>> {
    Ok(Json(
        state
            .meals
            .meal_counts(room_id, caller.user.id, query.period_id)
            .await?,
    ))
}

// ── Guest meals ─────────────────────────────────────────────────────────────

pub async fn list_guest_meals(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Query(query): Query<MealQuery>,
) -> AppResult<Json<Vec<GuestMeal>>> {
    let filter = MealFilter::from(query);
    Ok(Json(
        state
            .meals
            .list_guest_meals(room_id, caller.user.id, &filter)
            .await?,
    ))
}

pub async fn add_guest_meal(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Json(req): Json<NewGuestMeal>,
) -> AppResult<(StatusCode, Json<GuestMeal>)> {
    let guest = state.meals.add_guest_meal(room_id, caller.user.id, &req).await?;
    Ok((StatusCode::CREATED, Json(guest)))
}

pub async fn delete_guest_meal(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, guest_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state
        .meals
        .delete_guest_meal(room_id, caller.user.id, guest_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
