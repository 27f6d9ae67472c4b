//! Read-only management endpoints: inspecting what the core pipeline has
//! produced. Write-side CRUD for projects/policies/keys is out of scope —
//! those are created directly against the Store by the CLI's `project
//! create` helper, not over the network.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use apimon_core::bucket::BucketWidth;
use apimon_core::store::{alerts, observations, policies, rollups, AlertEvent, AlertPolicy, Observation, Project, Rollup};

use crate::error::ApiError;
use crate::state::AppState;

/// Every management route is scoped to the project the presented API key
/// maps to. There is no separate user-session auth layer, so a
/// `:project_id` path segment that doesn't match the key's own project is
/// treated the same as a nonexistent project, rather than granting
/// cross-project access.
fn require_own_project(path_id: i64, project: &Project) -> Result<(), ApiError> {
    if path_id != project.id {
        return Err(ApiError::NotFound(format!("no project with id {path_id}")));
    }
    Ok(())
}

/// `GET /api/whoami` — the project the presented API key maps to.
pub async fn whoami(Extension(project): Extension<Project>) -> Json<Project> {
    Json(project)
}

/// `GET /api/projects` — the one project the presented API key maps to.
/// With per-project-key auth standing in for user sessions, that set is
/// always exactly one project.
pub async fn list_projects(Extension(project): Extension<Project>) -> Json<Vec<Project>> {
    Json(vec![project])
}

#[derive(Deserialize)]
pub struct MetricsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub since: Option<DateTime<Utc>>,
}

fn default_limit() -> i64 {
    100
}

/// `GET /api/projects/:id/metrics` — raw observations for the project.
pub async fn list_metrics(
    State(state): State<Arc<AppState>>,
    Path(path_id): Path<i64>,
    Extension(project): Extension<Project>,
    Query(params): Query<MetricsQuery>,
) -> Result<Json<Vec<Observation>>, ApiError> {
    require_own_project(path_id, &project)?;
    let since = params.since.unwrap_or(DateTime::<Utc>::MIN_UTC);
    let rows = observations::list_observations_for_project(&state.db, project.id, since, params.limit).await?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct AggregatedQuery {
    pub width: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// `GET /api/projects/:id/metrics/aggregated` — rollups for the project.
pub async fn list_aggregated(
    State(state): State<Arc<AppState>>,
    Path(path_id): Path<i64>,
    Extension(project): Extension<Project>,
    Query(params): Query<AggregatedQuery>,
) -> Result<Json<Vec<Rollup>>, ApiError> {
    require_own_project(path_id, &project)?;

    let width = match params.width.as_deref() {
        Some(code) => Some(
            BucketWidth::from_code(code)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown bucket width '{code}'")))?,
        ),
        None => None,
    };

    let start = params.start.unwrap_or(DateTime::<Utc>::MIN_UTC);
    let end = params.end.unwrap_or_else(Utc::now);

    let rows = rollups::range_rollups(&state.db, project.id, start, end).await?;
    let rows = match width {
        Some(w) => rows.into_iter().filter(|r| r.bucket_width == w).collect(),
        None => rows,
    };

    Ok(Json(rows))
}

/// `GET /api/projects/:id/policies` — every policy (active or not) for the project.
pub async fn list_policies(
    State(state): State<Arc<AppState>>,
    Path(path_id): Path<i64>,
    Extension(project): Extension<Project>,
) -> Result<Json<Vec<AlertPolicy>>, ApiError> {
    require_own_project(path_id, &project)?;
    let rows = policies::list_policies_for_project(&state.db, project.id).await?;
    Ok(Json(rows))
}

/// `GET /api/projects/:id/alerts` — alert events for the project, most recent first.
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Path(path_id): Path<i64>,
    Extension(project): Extension<Project>,
) -> Result<Json<Vec<AlertEvent>>, ApiError> {
    require_own_project(path_id, &project)?;
    let rows = alerts::list_alerts_for_project(&state.db, project.id).await?;
    Ok(Json(rows))
}
