//! HTTP server and routing integration tests

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use callscribe_ci::{build_router, AppState};
use callscribe_common::config::TomlConfig;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Create test app state with in-memory database
async fn test_app_state() -> AppState {
    let db_pool = sqlx::SqlitePool::connect(":memory:").await.unwrap();
    callscribe_ci::db::init_tables(&db_pool).await.unwrap();
    AppState::new(db_pool, TomlConfig::default())
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_reports_module_identity() {
    let app = build_router(test_app_state().await);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "callscribe-ci");
}

#[tokio::test]
async fn process_rejects_empty_filter() {
    let app = build_router(test_app_state().await);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/transcriptions/process")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn process_rejects_inverted_time_range() {
    let app = build_router(test_app_state().await);

    let request = json!({
        "from": "2026-03-02T00:00:00Z",
        "to": "2026-03-01T00:00:00Z",
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/transcriptions/process")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(request.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn process_fails_before_any_record_without_recording_server() {
    // A valid key in the settings table, but no recording server in TOML
    let state = test_app_state().await;
    callscribe_ci::db::settings::set_stt_api_key(&state.db, "abcdef0123456789".to_string())
        .await
        .unwrap();
    let app = build_router(state);

    let request = json!({ "call_ids": ["call-1"] });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/transcriptions/process")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(request.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("recording server"));
}

#[tokio::test]
async fn status_rejects_blank_ids() {
    let app = build_router(test_app_state().await);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/transcriptions/status?ids=,,")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_reports_persisted_ids_only() {
    let state = test_app_state().await;
    sqlx::query(
        "INSERT INTO transcriptions (call_id, initiated_at) VALUES ('call-a', '2026-03-01T10:00:00Z')",
    )
    .execute(&state.db)
    .await
    .unwrap();
    let app = build_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/transcriptions/status?ids=call-a,call-b")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["requested"], 2);
    assert_eq!(body["found"], json!(["call-a"]));
}

#[tokio::test]
async fn settings_reject_blank_values() {
    let app = build_router(test_app_state().await);

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/settings/stt_api_key")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "value": "   " }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn detail_returns_persisted_payload_or_404() {
    let state = test_app_state().await;
    sqlx::query(
        "INSERT INTO transcriptions (call_id, initiated_at, transcript_text) \
         VALUES ('call-a', '2026-03-01T10:00:00Z', 'hello')",
    )
    .execute(&state.db)
    .await
    .unwrap();
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/transcriptions/call-a")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["transcript_text"], "hello");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/transcriptions/call-b")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
