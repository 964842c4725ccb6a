use super::auth::AuthUser;
use super::meals::PeriodQuery;
use crate::error::AppResult;
use crate::models::{MarketDate, ShoppingItem};
use crate::services::shopping_service::{NewMarketDate, NewShoppingItem, ShoppingItemChanges};
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
pub struct DateRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

pub async fn list_items(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<Vec<ShoppingItem>>> {
    Ok(Json(
        state
            .shopping
            .list_items(room_id, caller.user.id, query.period_id)
            .await?,
    ))
}

pub async fn add_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Json(req): Json<NewShoppingItem>,
) -> AppResult<(StatusCode, Json<ShoppingItem>)> {
    let item = state.shopping.add_item(room_id, caller.user.id, &req).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, item_id)): Path<(Uuid, Uuid)>,
    Json(changes): Json<ShoppingItemChanges>,
) -> AppResult<Json<ShoppingItem>> {
    Ok(Json(
        state
            .shopping
            .update_item(room_id, caller.user.id, item_id, &changes)
            .await?,
    ))
}

pub async fn delete_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state
        .shopping
        .delete_item(room_id, caller.user.id, item_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn approve_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ShoppingItem>> {
    Ok(Json(
        state
            .shopping
            .approve_item(room_id, caller.user.id, item_id)
            .await?,
    ))
}

// ── Market schedule ─────────────────────────────────────────────────────────

pub async fn list_market_dates(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<Vec<MarketDate>>> {
    Ok(Json(
        state
            .shopping
            .list_market_dates(room_id, caller.user.id, query.from, query.to)
            .await?,
    ))
}

pub async fn schedule_market_date(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Json(req): Json<NewMarketDate>,
) -> AppResult<(StatusCode, Json<MarketDate>)> {
    let date = state
        .shopping
        .schedule_market_date(room_id, caller.user.id, &req)
        .await?;
    Ok((StatusCode::CREATED, Json(date)))
}

pub async fn complete_market_date(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, date_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<MarketDate>> {
    Ok(Json(
        state
            .shopping
            .complete_market_date(room_id, caller.user.id, date_id)
            .await?,
    ))
}

pub async fn delete_market_date(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, date_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state
        .shopping
        .delete_market_date(room_id, caller.user.id, date_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
