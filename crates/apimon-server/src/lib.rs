//! API performance monitor HTTP server.
//!
//! Exposes `apimon-core`'s storage layer as a REST API: a single ingestion
//! endpoint for recording observations, and read-only management endpoints
//! for inspecting rollups, alert policies, and alert history. Bearer
//! API-key auth scopes every route to its owning project.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the complete axum router with all API routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/ingest", post(routes::ingest::ingest))
        .route("/whoami", get(routes::management::whoami))
        .route("/projects", get(routes::management::list_projects))
        .route(
            "/projects/{id}/metrics",
            get(routes::management::list_metrics),
        )
        .route(
            "/projects/{id}/metrics/aggregated",
            get(routes::management::list_aggregated),
        )
        .route(
            "/projects/{id}/policies",
            get(routes::management::list_policies),
        )
        .route(
            "/projects/{id}/alerts",
            get(routes::management::list_alerts),
        )
        // Auth middleware — applied to all routes; /healthz is exempted internally.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/healthz", get(routes::health::health))
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
