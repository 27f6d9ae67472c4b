//! Liveness probe. Unauthenticated — exempted in `auth::auth_middleware`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use apimon_core::store;

use crate::state::AppState;

/// `GET /healthz` — confirms the process is up and the database pool is
/// reachable. Does not touch the scheduler; a stalled tick loop doesn't fail
/// this check.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    match store::health_check(&state.db).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
