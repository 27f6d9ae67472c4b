//! Integration tests for the apimon-server API routes.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use apimon_core::store::{self, projects};

use apimon_server::state::AppState;

const TEST_KEY: &str = "sk_live_test_abc123";

async fn test_state() -> (Arc<AppState>, i64) {
    let pool = store::init_test_db().await.expect("init test db");
    let project = projects::create_project_with_key(&pool, "Acme", None, TEST_KEY)
        .await
        .expect("create project");

    let state = Arc::new(AppState {
        db: pool,
        bind_host: "127.0.0.1".to_string(),
        bind_port: 0,
        cancel: CancellationToken::new(),
    });

    (state, project.id)
}

async fn test_router() -> (axum::Router, i64) {
    let (state, project_id) = test_state().await;
    (apimon_server::build_router(state), project_id)
}

async fn get_json(router: axum::Router, path: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .uri(path)
        .header("Authorization", format!("Bearer {TEST_KEY}"))
        .body(Body::empty())
        .expect("build request");

    let response = router.oneshot(req).await.expect("send request");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("read body");
    let json: serde_json::Value = if bytes.to_bytes().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes.to_bytes()).expect("parse JSON")
    };

    (status, json)
}

async fn post_json(
    router: axum::Router,
    path: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method("POST")
        .uri(path)
        .header("Authorization", format!("Bearer {TEST_KEY}"))
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .expect("build request");

    let response = router.oneshot(req).await.expect("send request");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("read body");
    let json: serde_json::Value = if bytes.to_bytes().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes.to_bytes()).expect("parse JSON")
    };

    (status, json)
}

// ============================================================
// Health (no auth required)
// ============================================================

#[tokio::test]
async fn health_returns_ok_without_auth() {
    let (router, _) = test_router().await;
    let req = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .expect("build request");

    let response = router.oneshot(req).await.expect("send request");
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================
// Auth middleware
// ============================================================

#[tokio::test]
async fn auth_required_for_api_routes() {
    let (router, _) = test_router().await;
    let req = Request::builder()
        .uri("/api/whoami")
        .body(Body::empty())
        .expect("build request");

    let response = router.oneshot(req).await.expect("send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn auth_fails_with_wrong_key() {
    let (router, _) = test_router().await;
    let req = Request::builder()
        .uri("/api/whoami")
        .header("Authorization", "Bearer wrong-key")
        .body(Body::empty())
        .expect("build request");

    let response = router.oneshot(req).await.expect("send request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn auth_succeeds_with_valid_key() {
    let (router, _) = test_router().await;
    let (status, body) = get_json(router, "/api/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Acme");
}

// ============================================================
// Ingest
// ============================================================

#[tokio::test]
async fn ingest_rejects_empty_endpoint() {
    let (router, _) = test_router().await;
    let (status, _) = post_json(
        router,
        "/api/ingest",
        serde_json::json!({"endpoint": "", "status_code": 200, "latency_ms": 10}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ingest_rejects_negative_latency() {
    let (router, _) = test_router().await;
    let (status, _) = post_json(
        router,
        "/api/ingest",
        serde_json::json!({"endpoint": "/x", "status_code": 200, "latency_ms": -1}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ingest_accepts_valid_observation() {
    let (state, project_id) = test_state().await;
    let router = apimon_server::build_router(state.clone());

    let (status, _) = post_json(
        router,
        "/api/ingest",
        serde_json::json!({"endpoint": "/users", "status_code": 200, "latency_ms": 42}),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let rows = apimon_core::store::observations::list_observations_for_project(
        &state.db,
        project_id,
        chrono::DateTime::<chrono::Utc>::MIN_UTC,
        100,
    )
    .await
    .expect("list observations");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].endpoint, "/users");
    assert_eq!(rows[0].method, "GET");
}

#[tokio::test]
async fn ingest_defaults_method_to_get() {
    let (state, _) = test_state().await;
    let router = apimon_server::build_router(state.clone());

    let (status, _) = post_json(
        router,
        "/api/ingest",
        serde_json::json!({"endpoint": "/orders", "status_code": 201, "latency_ms": 5, "method": "POST"}),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

// ============================================================
// Management (read-only, project-scoped)
// ============================================================

#[tokio::test]
async fn list_metrics_returns_ingested_observations() {
    let (state, project_id) = test_state().await;
    let router = apimon_server::build_router(state.clone());

    post_json(
        router.clone(),
        "/api/ingest",
        serde_json::json!({"endpoint": "/a", "status_code": 200, "latency_ms": 10}),
    )
    .await;

    let (status, body) = get_json(router, &format!("/api/projects/{project_id}/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn list_metrics_for_foreign_project_is_not_found() {
    let (router, project_id) = test_router().await;
    let foreign_id = project_id + 1;
    let (status, _) = get_json(router, &format!("/api/projects/{foreign_id}/metrics")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_aggregated_rejects_unknown_width() {
    let (router, project_id) = test_router().await;
    let (status, _) = get_json(
        router,
        &format!("/api/projects/{project_id}/metrics/aggregated?width=bogus"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_policies_returns_created_policy() {
    let (state, project_id) = test_state().await;
    apimon_core::store::policies::create_policy(
        &state.db,
        project_id,
        "p95 too high",
        apimon_core::store::Metric::LatencyP95,
        apimon_core::store::Comparison::GreaterThan,
        500.0,
        apimon_core::store::Severity::Warn,
        15,
    )
    .await
    .expect("create policy");

    let router = apimon_server::build_router(state);
    let (status, body) = get_json(router, &format!("/api/projects/{project_id}/policies")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "p95 too high");
}

#[tokio::test]
async fn list_alerts_is_empty_for_fresh_project() {
    let (router, project_id) = test_router().await;
    let (status, body) = get_json(router, &format!("/api/projects/{project_id}/alerts")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn list_projects_returns_only_own_project() {
    let (router, project_id) = test_router().await;
    let (status, body) = get_json(router, "/api/projects").await;
    assert_eq!(status, StatusCode::OK);
    let arr = body.as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["id"], project_id);
}
