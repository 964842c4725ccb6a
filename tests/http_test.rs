mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use helpers::*;
use http_body_util::BodyExt;
use messmate_backend::routes::router;
use serde_json::Value;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

#[tokio::test]
async fn test_health_reports_ok() {
    let app = router(lazy_state());

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_me_requires_session() {
    let app = router(lazy_state());

    let response = app
        .oneshot(Request::get("/api/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_room_routes_require_session() {
    let app = router(lazy_state());

    for uri in [
        "/api/rooms",
        "/api/rooms/7b0c3c52-27a2-4e37-9f0e-0d3a4c1f2b11/meals",
        "/api/notifications",
    ] {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_ready_degrades_without_database() {
    // test_config points at a closed port unless TEST_DATABASE_URL is set
    if std::env::var("TEST_DATABASE_URL").is_ok() {
        return;
    }
    let app = router(lazy_state());

    let response = app
        .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["database"], "down");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = router(lazy_state());

    let response = app
        .oneshot(Request::get("/api/nowhere").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_preflight_allowed() {
    let app = router(lazy_state());

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/rooms")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}
