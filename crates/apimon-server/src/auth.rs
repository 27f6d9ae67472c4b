//! Bearer API-key authentication.
//!
//! Every route under `/api` except `/healthz` requires
//! `Authorization: Bearer <key>`, where `<key>` maps to exactly one project.
//! The middleware resolves the key to its project and inserts it into the
//! request's extensions so handlers can pull it out with `Extension<Project>`
//! instead of re-authenticating.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use apimon_core::store::{projects, Project};

use crate::error::ApiError;
use crate::state::AppState;

fn extract_bearer_key(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("missing or malformed Authorization header".to_string()))
}

/// Resolve a Bearer key to its project. Split out from `auth_middleware` so
/// the lookup itself stays unit-testable without spinning up a router.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Project, ApiError> {
    let key = extract_bearer_key(headers)?;
    projects::find_project_by_api_key(&state.db, key)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("unknown or inactive API key".to_string()))
}

/// Axum middleware: authenticate the request and attach the resolved
/// `Project` to its extensions. Skips `/healthz`.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    if request.uri().path() == "/healthz" {
        return next.run(request).await;
    }

    match authenticate(&state, &headers).await {
        Ok(project) => {
            request.extensions_mut().insert(project);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}
