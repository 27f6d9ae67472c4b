//! The ingestion endpoint — the only inbound write path.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use apimon_core::store::{observations, NewObservation, Project};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct IngestRequest {
    pub endpoint: String,
    #[serde(default = "default_method")]
    pub method: String,
    pub status_code: i32,
    pub latency_ms: i64,
    pub timestamp: Option<DateTime<Utc>>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// `POST /api/ingest` — record one observation for the authenticated project.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Extension(project): Extension<Project>,
    Json(body): Json<IngestRequest>,
) -> Result<StatusCode, ApiError> {
    if body.endpoint.is_empty() {
        return Err(ApiError::BadRequest("endpoint must not be empty".to_string()));
    }
    if body.latency_ms < 0 {
        return Err(ApiError::BadRequest("latency_ms must not be negative".to_string()));
    }

    let observation = NewObservation {
        project_id: project.id,
        endpoint: body.endpoint,
        method: body.method,
        status_code: body.status_code,
        latency_ms: body.latency_ms,
        timestamp: body.timestamp.unwrap_or_else(Utc::now),
    };

    observations::insert_observation(&state.db, &observation).await?;

    Ok(StatusCode::NO_CONTENT)
}
