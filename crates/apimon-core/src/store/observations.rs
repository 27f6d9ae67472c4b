//! CRUD for raw request observations.

use chrono::{DateTime, Utc};
use sqlx::Executor;

use super::models::{NewObservation, Observation};
use super::DbPool;
use crate::error::StorageError;

#[derive(sqlx::FromRow)]
struct ObservationRow {
    project_id: i64,
    endpoint: String,
    method: String,
    status_code: i64,
    latency_ms: i64,
    timestamp: String,
}

impl ObservationRow {
    fn into_observation(self) -> Observation {
        Observation {
            project_id: self.project_id,
            endpoint: self.endpoint,
            method: self.method,
            #[allow(clippy::cast_possible_truncation)]
            status_code: self.status_code as i32,
            latency_ms: self.latency_ms,
            timestamp: self
                .timestamp
                .parse::<DateTime<Utc>>()
                .expect("observations.timestamp is always a valid RFC-3339 string"),
        }
    }
}

/// Append one observation. Constant-time; no read-before-write.
pub async fn insert_observation(pool: &DbPool, o: &NewObservation) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO observations (project_id, endpoint, method, status_code, latency_ms, timestamp) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(o.project_id)
    .bind(&o.endpoint)
    .bind(&o.method)
    .bind(i64::from(o.status_code))
    .bind(o.latency_ms)
    .bind(o.timestamp.to_rfc3339())
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(())
}

/// Observations with `start <= timestamp < end`, across all projects. Order
/// is unspecified; callers that need per-group ordering sort after the fact.
pub async fn range_observations(
    pool: &DbPool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Observation>, StorageError> {
    let rows: Vec<ObservationRow> = sqlx::query_as(
        "SELECT project_id, endpoint, method, status_code, latency_ms, timestamp \
         FROM observations WHERE timestamp >= ? AND timestamp < ?",
    )
    .bind(start.to_rfc3339())
    .bind(end.to_rfc3339())
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(rows.into_iter().map(ObservationRow::into_observation).collect())
}

/// Observations for one project, most recent first, capped at `limit` rows.
/// Backs the management read endpoint; the aggregator uses `range_observations`
/// directly since it needs every project in the window.
pub async fn list_observations_for_project(
    pool: &DbPool,
    project_id: i64,
    since: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Observation>, StorageError> {
    let rows: Vec<ObservationRow> = sqlx::query_as(
        "SELECT project_id, endpoint, method, status_code, latency_ms, timestamp \
         FROM observations WHERE project_id = ? AND timestamp >= ? \
         ORDER BY timestamp DESC LIMIT ?",
    )
    .bind(project_id)
    .bind(since.to_rfc3339())
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(rows.into_iter().map(ObservationRow::into_observation).collect())
}

/// Latencies of every observation falling into exactly one bucket. Used to
/// recompute p95 from ground truth on merge — takes a generic executor so
/// the rollup upsert can run it inside its own transaction instead of
/// opening a second connection.
pub async fn range_observations_in_bucket<'e, E>(
    executor: E,
    project_id: i64,
    endpoint: &str,
    bucket_start: DateTime<Utc>,
    bucket_width_secs: i64,
) -> Result<Vec<i64>, StorageError>
where
    E: Executor<'e, Database = sqlx::Sqlite>,
{
    let bucket_end = bucket_start + chrono::Duration::seconds(bucket_width_secs);

    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT latency_ms FROM observations \
         WHERE project_id = ? AND endpoint = ? AND timestamp >= ? AND timestamp < ?",
    )
    .bind(project_id)
    .bind(endpoint)
    .bind(bucket_start.to_rfc3339())
    .bind(bucket_end.to_rfc3339())
    .fetch_all(executor)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Remove observations older than `cutoff`. The external retention
/// collaborator's job; core never calls this on its own.
pub async fn delete_observations_before(
    pool: &DbPool,
    cutoff: DateTime<Utc>,
) -> Result<u64, StorageError> {
    let result = pool
        .execute(
            sqlx::query("DELETE FROM observations WHERE timestamp < ?").bind(cutoff.to_rfc3339()),
        )
        .await
        .map_err(|e| StorageError::Query { source: e })?;

    Ok(result.rows_affected())
}
