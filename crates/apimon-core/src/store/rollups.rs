//! Upsert-with-merge for aggregated rollups.
//!
//! The merge semantics are spelled out here rather than left to the
//! persistence layer: counts add, p95 always recomputes from a fresh scan of
//! every observation in the bucket (never from a combined approximation of
//! old-p95 and new-p95, which would not converge to the true percentile).
//! The rescan runs on the same transaction as the upsert, so it sees a
//! consistent snapshot and never contends with the writer lock it already
//! holds.

use chrono::{DateTime, Utc};

use super::models::Rollup;
use super::{observations, DbPool};
use crate::bucket::{p95, BucketWidth};
use crate::error::StorageError;

#[derive(sqlx::FromRow)]
struct RollupRow {
    project_id: i64,
    endpoint: String,
    bucket_start: String,
    bucket_width: String,
    request_count: i64,
    error_count: i64,
    p95_latency_ms: i64,
}

impl RollupRow {
    fn into_rollup(self) -> Rollup {
        Rollup {
            project_id: self.project_id,
            endpoint: self.endpoint,
            bucket_start: self
                .bucket_start
                .parse()
                .expect("rollups.bucket_start is always a valid RFC-3339 string"),
            bucket_width: BucketWidth::from_code(&self.bucket_width)
                .expect("rollups.bucket_width is always a known code"),
            request_count: self.request_count,
            error_count: self.error_count,
            p95_latency_ms: self.p95_latency_ms,
        }
    }
}

/// The observed counts and latencies for one (project, endpoint, bucket)
/// group, prior to being merged into the stored rollup.
pub struct GroupContribution {
    pub project_id: i64,
    pub endpoint: String,
    pub bucket_start: DateTime<Utc>,
    pub bucket_width: BucketWidth,
    pub request_count: i64,
    pub error_count: i64,
}

/// Atomically insert or merge a rollup.
///
/// If no row exists for the identity key `(project_id, endpoint, bucket_start,
/// bucket_width)`, inserts one with `contribution`'s counts and the p95 of
/// `group_latencies`. If a row exists, adds the contribution's counts to it
/// and recomputes p95 from a full range scan of every observation currently
/// in the bucket, not from a merge of old and new p95. The whole operation
/// — existence check, rescan, and write — runs in one transaction, so
/// concurrent upserts of the same key are serialized by SQLite's writer lock.
///
/// Returns the post-merge row and whether the row was newly inserted.
pub async fn upsert_rollup(
    pool: &DbPool,
    contribution: &GroupContribution,
    group_latencies: &[i64],
) -> Result<(Rollup, bool), StorageError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| StorageError::Connection { source: e })?;

    let existing: Option<RollupRow> = sqlx::query_as(
        "SELECT project_id, endpoint, bucket_start, bucket_width, request_count, error_count, p95_latency_ms \
         FROM rollups WHERE project_id = ? AND endpoint = ? AND bucket_start = ? AND bucket_width = ?",
    )
    .bind(contribution.project_id)
    .bind(&contribution.endpoint)
    .bind(contribution.bucket_start.to_rfc3339())
    .bind(contribution.bucket_width.code())
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    let is_new = existing.is_none();

    let (request_count, error_count, p95_latency_ms) = if let Some(existing) = existing {
        // A prior row exists: the bucket already holds observations beyond
        // this contribution, so p95 must be recomputed from all of them.
        let all_latencies = observations::range_observations_in_bucket(
            &mut *tx,
            contribution.project_id,
            &contribution.endpoint,
            contribution.bucket_start,
            contribution.bucket_width.as_secs(),
        )
        .await?;

        let merged_request_count = existing.request_count + contribution.request_count;
        let merged_error_count = existing.error_count + contribution.error_count;
        let merged = Rollup {
            project_id: contribution.project_id,
            endpoint: contribution.endpoint.clone(),
            bucket_start: contribution.bucket_start,
            bucket_width: contribution.bucket_width,
            request_count: merged_request_count,
            error_count: merged_error_count,
            p95_latency_ms: p95(&all_latencies),
        };
        if !merged.counts_are_valid() {
            return Err(StorageError::InvariantViolation {
                message: format!(
                    "rollup for project {} endpoint {} would have error_count {} > request_count {}",
                    merged.project_id, merged.endpoint, merged.error_count, merged.request_count
                ),
            });
        }

        (merged.request_count, merged.error_count, merged.p95_latency_ms)
    } else {
        (
            contribution.request_count,
            contribution.error_count,
            p95(group_latencies),
        )
    };

    sqlx::query(
        "INSERT INTO rollups (project_id, endpoint, bucket_start, bucket_width, request_count, error_count, p95_latency_ms) \
         VALUES (?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(project_id, endpoint, bucket_start, bucket_width) DO UPDATE SET \
           request_count = excluded.request_count, \
           error_count = excluded.error_count, \
           p95_latency_ms = excluded.p95_latency_ms",
    )
    .bind(contribution.project_id)
    .bind(&contribution.endpoint)
    .bind(contribution.bucket_start.to_rfc3339())
    .bind(contribution.bucket_width.code())
    .bind(request_count)
    .bind(error_count)
    .bind(p95_latency_ms)
    .execute(&mut *tx)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    tx.commit()
        .await
        .map_err(|e| StorageError::Connection { source: e })?;

    Ok((
        Rollup {
            project_id: contribution.project_id,
            endpoint: contribution.endpoint.clone(),
            bucket_start: contribution.bucket_start,
            bucket_width: contribution.bucket_width,
            request_count,
            error_count,
            p95_latency_ms,
        },
        is_new,
    ))
}

/// Fetch one rollup by identity key, if it exists.
pub async fn get_rollup(
    pool: &DbPool,
    project_id: i64,
    endpoint: &str,
    bucket_start: DateTime<Utc>,
    bucket_width: BucketWidth,
) -> Result<Option<Rollup>, StorageError> {
    let row: Option<RollupRow> = sqlx::query_as(
        "SELECT project_id, endpoint, bucket_start, bucket_width, request_count, error_count, p95_latency_ms \
         FROM rollups WHERE project_id = ? AND endpoint = ? AND bucket_start = ? AND bucket_width = ?",
    )
    .bind(project_id)
    .bind(endpoint)
    .bind(bucket_start.to_rfc3339())
    .bind(bucket_width.code())
    .fetch_optional(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(row.map(RollupRow::into_rollup))
}

/// Rollups for a project with `bucket_start` in `[start, end)`, any width.
/// Used by the management read path (out of scope for the core, but shares
/// this store).
pub async fn range_rollups(
    pool: &DbPool,
    project_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Rollup>, StorageError> {
    let rows: Vec<RollupRow> = sqlx::query_as(
        "SELECT project_id, endpoint, bucket_start, bucket_width, request_count, error_count, p95_latency_ms \
         FROM rollups WHERE project_id = ? AND bucket_start >= ? AND bucket_start < ? \
         ORDER BY bucket_start",
    )
    .bind(project_id)
    .bind(start.to_rfc3339())
    .bind(end.to_rfc3339())
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(rows.into_iter().map(RollupRow::into_rollup).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{init_test_db, observations, projects};
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn contribution(project_id: i64, request_count: i64, error_count: i64) -> GroupContribution {
        GroupContribution {
            project_id,
            endpoint: "/a".to_string(),
            bucket_start: ts(0),
            bucket_width: BucketWidth::OneMinute,
            request_count,
            error_count,
        }
    }

    #[tokio::test]
    async fn first_upsert_inserts() {
        let pool = init_test_db().await.unwrap();
        let c = contribution(1, 3, 1);
        let (rollup, is_new) = upsert_rollup(&pool, &c, &[10, 20, 30]).await.unwrap();
        assert!(is_new);
        assert_eq!(rollup.request_count, 3);
        assert_eq!(rollup.error_count, 1);
        assert_eq!(rollup.p95_latency_ms, 30);
    }

    #[tokio::test]
    async fn second_upsert_merges_counts_and_recomputes_p95_from_observations() {
        let pool = init_test_db().await.unwrap();
        let project_id = projects::create_project(&pool, "Acme", None).await.unwrap().id;

        for latency in [1, 2, 3] {
            observations::insert_observation(
                &pool,
                &crate::store::models::NewObservation {
                    project_id,
                    endpoint: "/a".to_string(),
                    method: "GET".to_string(),
                    status_code: 200,
                    latency_ms: latency,
                    timestamp: ts(0),
                },
            )
            .await
            .unwrap();
        }
        let first = contribution(project_id, 3, 0);
        upsert_rollup(&pool, &first, &[1, 2, 3]).await.unwrap();

        for latency in [4, 5, 6, 7] {
            observations::insert_observation(
                &pool,
                &crate::store::models::NewObservation {
                    project_id,
                    endpoint: "/a".to_string(),
                    method: "GET".to_string(),
                    status_code: 200,
                    latency_ms: latency,
                    timestamp: ts(10),
                },
            )
            .await
            .unwrap();
        }
        let second = contribution(project_id, 4, 1);
        let (rollup, is_new) = upsert_rollup(&pool, &second, &[4, 5, 6, 7]).await.unwrap();

        assert!(!is_new);
        assert_eq!(rollup.request_count, 7);
        assert_eq!(rollup.error_count, 1);
        // p95([1..7]) = floor(7*0.95)-1 = 5 -> sorted[5] = 6
        assert_eq!(rollup.p95_latency_ms, 6);
    }

    #[tokio::test]
    async fn distinct_widths_are_distinct_rows() {
        let pool = init_test_db().await.unwrap();
        let mut c = contribution(1, 1, 0);
        upsert_rollup(&pool, &c, &[10]).await.unwrap();
        c.bucket_width = BucketWidth::FiveMinutes;
        let (_, is_new) = upsert_rollup(&pool, &c, &[10]).await.unwrap();
        assert!(is_new, "a different bucket_width is a different identity key");
    }

    #[tokio::test]
    async fn get_rollup_returns_none_for_unknown_key() {
        let pool = init_test_db().await.unwrap();
        let got = get_rollup(&pool, 1, "/a", ts(0), BucketWidth::OneMinute).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn merge_rejects_error_count_exceeding_request_count() {
        let pool = init_test_db().await.unwrap();
        let project_id = projects::create_project(&pool, "Acme", None).await.unwrap().id;

        let first = contribution(project_id, 1, 0);
        upsert_rollup(&pool, &first, &[10]).await.unwrap();

        let second = contribution(project_id, 0, 5);
        let err = upsert_rollup(&pool, &second, &[]).await.unwrap_err();
        assert!(matches!(err, StorageError::InvariantViolation { .. }));
    }
}
