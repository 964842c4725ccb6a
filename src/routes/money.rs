use super::auth::AuthUser;
use super::meals::PeriodQuery;
use crate::error::AppResult;
use crate::models::{AccountTransaction, ExtraExpense, Payment};
use crate::services::payment_service::{BalanceSheet, NewExpense, NewPayment, NewTransaction};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct LedgerQuery {
    pub period_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

// ── Payments ────────────────────────────────────────────────────────────────

pub async fn list_payments(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Query(query): Query<LedgerQuery>,
) -> AppResult<Json<Vec<Payment>>> {
    Ok(Json(
        state
            .payments
            .list_payments(room_id, caller.user.id, query.period_id, query.user_id)
            .await?,
    ))
}

pub async fn record_payment(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Json(req): Json<NewPayment>,
) -> AppResult<(StatusCode, Json<Payment>)> {
    let payment = state
        .payments
        .record_payment(room_id, caller.user.id, &req)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn delete_payment(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, payment_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state
        .payments
        .delete_payment(room_id, caller.user.id, payment_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Extra expenses ──────────────────────────────────────────────────────────

pub async fn list_expenses(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<Vec<ExtraExpense>>> {
    Ok(Json(
        state
            .payments
            .list_expenses(room_id, caller.user.id, query.period_id)
            .await?,
    ))
}

pub async fn record_expense(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Json(req): Json<NewExpense>,
) -> AppResult<(StatusCode, Json<ExtraExpense>)> {
    let expense = state
        .payments
        .record_expense(room_id, caller.user.id, &req)
        .await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn delete_expense(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((room_id, expense_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state
        .payments
        .delete_expense(room_id, caller.user.id, expense_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Account transactions ────────────────────────────────────────────────────

pub async fn list_transactions(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Query(query): Query<LedgerQuery>,
) -> AppResult<Json<Vec<AccountTransaction>>> {
    Ok(Json(
        state
            .payments
            .list_transactions(room_id, caller.user.id, query.period_id, query.user_id)
            .await?,
    ))
}

pub async fn record_transaction(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
    Json(req): Json<NewTransaction>,
) -> AppResult<(StatusCode, Json<AccountTransaction>)> {
    let transaction = state
        .payments
        .record_transaction(room_id, caller.user.id, &req)
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn balances(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<BalanceSheet>> {
    Ok(Json(state.payments.balances(room_id, caller.user.id).await?))
}
