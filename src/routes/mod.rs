//! JSON API over the services.

pub mod auth;
pub mod data;
pub mod meals;
pub mod money;
pub mod notifications;
pub mod periods;
pub mod rooms;
pub mod shopping;
pub mod votes;

use crate::error::{AppError, AppResult};
use crate::rate_limit::rate_limit;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::warn;

/// Largest accepted request body (workbook uploads included)
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Decode an optional JSON body; an empty body yields the default
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::Validation(format!("Invalid JSON body: {}", e)))
}

/// GET /health: liveness
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health/ready: liveness plus a database round-trip
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.database.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok", "database": "up" }))),
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "down" })),
            )
        }
    }
}

fn room_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(rooms::list_rooms).post(rooms::create_room))
        .route("/join", post(rooms::join_room))
        .route(
            "/{room_id}",
            get(rooms::get_room).put(rooms::update_room).delete(rooms::delete_room),
        )
        .route("/{room_id}/leave", post(rooms::leave_room))
        .route("/{room_id}/transfer", post(rooms::transfer_admin))
        .route(
            "/{room_id}/join-code",
            get(rooms::reveal_join_code).post(rooms::rotate_join_code),
        )
        // Members
        .route("/{room_id}/members", get(rooms::list_members))
        .route("/{room_id}/members/{user_id}/role", put(rooms::change_role))
        .route("/{room_id}/members/{user_id}", delete(rooms::remove_member))
        // Invitations
        .route(
            "/{room_id}/invitations",
            get(rooms::list_invitations).post(rooms::create_invitation),
        )
        .route(
            "/{room_id}/invitations/{invite_id}",
            delete(rooms::revoke_invitation),
        )
        // Periods
        .route(
            "/{room_id}/periods",
            get(periods::list_periods).post(periods::start_period),
        )
        .route("/{room_id}/periods/current", get(periods::current_period))
        .route("/{room_id}/periods/{period_id}", get(periods::get_period))
        .route("/{room_id}/periods/{period_id}/end", post(periods::end_period))
        .route("/{room_id}/periods/{period_id}/lock", post(periods::lock_period))
        .route("/{room_id}/periods/{period_id}/unlock", post(periods::unlock_period))
        .route("/{room_id}/periods/{period_id}/archive", post(periods::archive_period))
        .route("/{room_id}/periods/{period_id}/summary", get(periods::period_summary))
        .route("/{room_id}/periods/{period_id}/export", get(data::export_period))
        .route("/{room_id}/import", post(data::import_workbook))
        // Meals
        .route("/{room_id}/meals", get(meals::list_meals).post(meals::set_meal))
        .route("/{room_id}/meals/toggle", post(meals::toggle_meal))
        .route("/{room_id}/meals/range", post(meals::set_meals_range))
        .route("/{room_id}/meals/counts", get(meals::meal_counts))
        .route(
            "/{room_id}/guest-meals",
            get(meals::list_guest_meals).post(meals::add_guest_meal),
        )
        .route("/{room_id}/guest-meals/{guest_id}", delete(meals::delete_guest_meal))
        // Shopping and market schedule
        .route(
            "/{room_id}/shopping",
            get(shopping::list_items).post(shopping::add_item),
        )
        .route(
            "/{room_id}/shopping/{item_id}",
            put(shopping::update_item).delete(shopping::delete_item),
        )
        .route("/{room_id}/shopping/{item_id}/approve", post(shopping::approve_item))
        .route(
            "/{room_id}/market-dates",
            get(shopping::list_market_dates).post(shopping::schedule_market_date),
        )
        .route(
            "/{room_id}/market-dates/{date_id}/complete",
            post(shopping::complete_market_date),
        )
        .route(
            "/{room_id}/market-dates/{date_id}",
            delete(shopping::delete_market_date),
        )
        // Money
        .route(
            "/{room_id}/payments",
            get(money::list_payments).post(money::record_payment),
        )
        .route("/{room_id}/payments/{payment_id}", delete(money::delete_payment))
        .route(
            "/{room_id}/expenses",
            get(money::list_expenses).post(money::record_expense),
        )
        .route("/{room_id}/expenses/{expense_id}", delete(money::delete_expense))
        .route(
            "/{room_id}/transactions",
            get(money::list_transactions).post(money::record_transaction),
        )
        .route("/{room_id}/balances", get(money::balances))
        // Votes
        .route("/{room_id}/votes", get(votes::list_votes).post(votes::create_vote))
        .route("/{room_id}/votes/{vote_id}", get(votes::get_vote))
        .route("/{room_id}/votes/{vote_id}/ballot", post(votes::cast_ballot))
        .route("/{room_id}/votes/{vote_id}/close", post(votes::close_vote))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .nest("/rooms", room_routes())
        .route("/invitations/accept", post(rooms::accept_invitation))
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/notifications/{id}", delete(notifications::delete))
}

/// Full application router with tracing, CORS, body limits and rate limiting
pub fn router(state: AppState) -> Router {
    let api = api_routes().layer(middleware::from_fn_with_state(
        state.rate_limiter.clone(),
        rate_limit,
    ));

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, serde::Deserialize, PartialEq)]
    struct Body {
        end_date: Option<String>,
    }

    #[test]
    fn test_optional_json() {
        assert_eq!(optional_json::<Body>(&Bytes::new()).unwrap(), Body::default());
        assert_eq!(optional_json::<Body>(&Bytes::from_static(b"  \n")).unwrap(), Body::default());
        assert_eq!(
            optional_json::<Body>(&Bytes::from_static(br#"{"end_date":"2025-03-31"}"#))
                .unwrap()
                .end_date
                .as_deref(),
            Some("2025-03-31")
        );
        assert!(matches!(
            optional_json::<Body>(&Bytes::from_static(b"{oops")),
            Err(AppError::Validation(_))
        ));
    }
}
