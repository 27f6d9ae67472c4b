//! CRUD for projects and their API keys.
//!
//! Project/key management lives outside the aggregation-and-alerting core,
//! but the ingestion endpoint needs *some* way to turn a Bearer token into a
//! project. A post-save signal that silently created a key alongside every
//! project was a known source of duplicate-key bugs elsewhere;
//! `create_project_with_key` replaces that pattern with an explicit
//! two-statement transaction instead.

use chrono::Utc;
use sha2::{Digest, Sha256};

use super::models::Project;
use super::DbPool;
use crate::error::StorageError;

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: i64,
    name: String,
    notification_email: Option<String>,
    created_at: String,
}

impl ProjectRow {
    fn into_project(self) -> Project {
        Project {
            id: self.id,
            name: self.name,
            notification_email: self.notification_email,
            created_at: self
                .created_at
                .parse()
                .expect("projects.created_at is always a valid RFC-3339 string"),
        }
    }
}

/// Hash an API key for at-rest storage. Keys are bearer secrets; only the
/// hash is ever persisted.
pub fn hash_api_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(digest)
}

/// Create a project with no API key. Exposed for tests and for callers that
/// mint the key separately.
pub async fn create_project(
    pool: &DbPool,
    name: &str,
    notification_email: Option<&str>,
) -> Result<Project, StorageError> {
    let created_at = Utc::now();
    let id = sqlx::query("INSERT INTO projects (name, notification_email, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(notification_email)
        .bind(created_at.to_rfc3339())
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?
        .last_insert_rowid();

    Ok(Project {
        id,
        name: name.to_string(),
        notification_email: notification_email.map(str::to_string),
        created_at,
    })
}

/// Create a project and its first API key in one transaction, returning the
/// project and the plaintext key (shown once — only the hash is stored).
pub async fn create_project_with_key(
    pool: &DbPool,
    name: &str,
    notification_email: Option<&str>,
    plaintext_key: &str,
) -> Result<Project, StorageError> {
    let mut tx = pool.begin().await.map_err(|e| StorageError::Connection { source: e })?;

    let created_at = Utc::now();
    let project_id = sqlx::query(
        "INSERT INTO projects (name, notification_email, created_at) VALUES (?, ?, ?)",
    )
    .bind(name)
    .bind(notification_email)
    .bind(created_at.to_rfc3339())
    .execute(&mut *tx)
    .await
    .map_err(|e| StorageError::Query { source: e })?
    .last_insert_rowid();

    sqlx::query("INSERT INTO api_keys (project_id, key_hash, is_active, created_at) VALUES (?, ?, 1, ?)")
        .bind(project_id)
        .bind(hash_api_key(plaintext_key))
        .bind(created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    tx.commit().await.map_err(|e| StorageError::Connection { source: e })?;

    Ok(Project {
        id: project_id,
        name: name.to_string(),
        notification_email: notification_email.map(str::to_string),
        created_at,
    })
}

/// Look up the project an (active) API key maps to, by its plaintext value.
pub async fn find_project_by_api_key(
    pool: &DbPool,
    plaintext_key: &str,
) -> Result<Option<Project>, StorageError> {
    let row: Option<ProjectRow> = sqlx::query_as(
        "SELECT p.id, p.name, p.notification_email, p.created_at FROM projects p \
         JOIN api_keys k ON k.project_id = p.id \
         WHERE k.key_hash = ? AND k.is_active = 1",
    )
    .bind(hash_api_key(plaintext_key))
    .fetch_optional(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(row.map(ProjectRow::into_project))
}

/// Fetch a project by id.
pub async fn get_project(pool: &DbPool, id: i64) -> Result<Option<Project>, StorageError> {
    let row: Option<ProjectRow> = sqlx::query_as(
        "SELECT id, name, notification_email, created_at FROM projects WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(row.map(ProjectRow::into_project))
}

/// List every project, ordered by creation time.
pub async fn list_projects(pool: &DbPool) -> Result<Vec<Project>, StorageError> {
    let rows: Vec<ProjectRow> = sqlx::query_as(
        "SELECT id, name, notification_email, created_at FROM projects ORDER BY created_at",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(rows.into_iter().map(ProjectRow::into_project).collect())
}
