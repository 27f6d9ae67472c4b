//! The bucket aggregator.
//!
//! Turns a window of raw observations into rollups at every bucket width.
//! Idempotency is the caller's responsibility: re-invoking `aggregate` twice
//! on the same window double-counts, because the upsert merge is additive.
//! The scheduler is what guarantees each window is aggregated exactly once.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::bucket::{align, BucketWidth};
use crate::error::AggregatorError;
use crate::store::models::Rollup;
use crate::store::rollups::{self, GroupContribution};
use crate::store::{observations, DbPool};

/// Aggregate every observation with `start <= timestamp < end` into rollups
/// at each of the three bucket widths, returning every rollup touched
/// (inserted or merged).
///
/// `start` must be strictly before `end`; both are UTC. The window is
/// typically exactly one minute wide and minute-aligned, but this function
/// accepts any window and does the right thing with it.
pub async fn aggregate(
    pool: &DbPool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Rollup>, AggregatorError> {
    if start >= end {
        return Err(AggregatorError::InvalidWindow {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        });
    }

    let snapshot = observations::range_observations(pool, start, end).await?;
    if snapshot.is_empty() {
        return Ok(Vec::new());
    }

    let mut touched = Vec::new();

    for width in BucketWidth::ALL {
        // Group by (project, endpoint, bucket_start) for this width.
        let mut groups: HashMap<(i64, String, DateTime<Utc>), Vec<(i32, i64)>> = HashMap::new();
        for o in &snapshot {
            let bucket_start = align(o.timestamp, width);
            groups
                .entry((o.project_id, o.endpoint.clone(), bucket_start))
                .or_default()
                .push((o.status_code, o.latency_ms));
        }

        for ((project_id, endpoint, bucket_start), rows) in groups {
            let request_count = rows.len() as i64;
            let error_count = rows.iter().filter(|(status, _)| *status >= 500).count() as i64;
            let latencies: Vec<i64> = rows.iter().map(|(_, latency)| *latency).collect();

            let contribution = GroupContribution {
                project_id,
                endpoint,
                bucket_start,
                bucket_width: width,
                request_count,
                error_count,
            };

            let (rollup, _is_new) = rollups::upsert_rollup(pool, &contribution, &latencies).await?;
            touched.push(rollup);
        }
    }

    Ok(touched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::NewObservation;
    use crate::store::{init_test_db, projects};
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    async fn seed_project(pool: &DbPool) -> i64 {
        projects::create_project(pool, "Acme", None).await.unwrap().id
    }

    async fn insert(pool: &DbPool, project_id: i64, endpoint: &str, status: i32, latency: i64, at: i64) {
        observations::insert_observation(
            pool,
            &NewObservation {
                project_id,
                endpoint: endpoint.to_string(),
                method: "GET".to_string(),
                status_code: status,
                latency_ms: latency,
                timestamp: ts(at),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn empty_window_returns_empty() {
        let pool = init_test_db().await.unwrap();
        let touched = aggregate(&pool, ts(0), ts(60)).await.unwrap();
        assert!(touched.is_empty());
    }

    #[tokio::test]
    async fn inverted_window_is_an_error() {
        let pool = init_test_db().await.unwrap();
        let err = aggregate(&pool, ts(60), ts(0)).await.unwrap_err();
        assert!(matches!(err, AggregatorError::InvalidWindow { .. }));
    }

    #[tokio::test]
    async fn single_observation_produces_three_rollups() {
        let pool = init_test_db().await.unwrap();
        let project_id = seed_project(&pool).await;
        insert(&pool, project_id, "/a", 200, 50, 30).await;

        let touched = aggregate(&pool, ts(0), ts(60)).await.unwrap();
        assert_eq!(touched.len(), 3);
        for r in &touched {
            assert_eq!(r.request_count, 1);
            assert_eq!(r.error_count, 0);
            assert_eq!(r.p95_latency_ms, 50);
            assert_eq!(r.bucket_start, ts(0));
        }
    }

    #[tokio::test]
    async fn p95_offset_rule_twenty_observations() {
        let pool = init_test_db().await.unwrap();
        let project_id = seed_project(&pool).await;
        for latency in 1..=20 {
            insert(&pool, project_id, "/a", 200, latency, 1).await;
        }

        let touched = aggregate(&pool, ts(0), ts(60)).await.unwrap();
        let one_min = touched
            .iter()
            .find(|r| r.bucket_width == BucketWidth::OneMinute)
            .unwrap();
        assert_eq!(one_min.p95_latency_ms, 19);
    }

    #[tokio::test]
    async fn error_counting_counts_5xx_only() {
        let pool = init_test_db().await.unwrap();
        let project_id = seed_project(&pool).await;
        for _ in 0..8 {
            insert(&pool, project_id, "/a", 200, 10, 1).await;
        }
        insert(&pool, project_id, "/a", 500, 10, 1).await;
        insert(&pool, project_id, "/a", 503, 10, 1).await;

        let touched = aggregate(&pool, ts(0), ts(60)).await.unwrap();
        let one_min = touched
            .iter()
            .find(|r| r.bucket_width == BucketWidth::OneMinute)
            .unwrap();
        assert_eq!(one_min.request_count, 10);
        assert_eq!(one_min.error_count, 2);
    }

    #[tokio::test]
    async fn observation_at_end_is_excluded() {
        let pool = init_test_db().await.unwrap();
        let project_id = seed_project(&pool).await;
        insert(&pool, project_id, "/a", 200, 10, 60).await;

        let touched = aggregate(&pool, ts(0), ts(60)).await.unwrap();
        assert!(touched.is_empty());
    }

    #[tokio::test]
    async fn merge_across_two_windows_recomputes_five_minute_bucket() {
        let pool = init_test_db().await.unwrap();
        let project_id = seed_project(&pool).await;

        for latency in [1, 2, 3] {
            insert(&pool, project_id, "/a", 200, latency, 10).await;
        }
        aggregate(&pool, ts(0), ts(60)).await.unwrap();

        for latency in [4, 5, 6, 7] {
            insert(&pool, project_id, "/a", 200, latency, 70).await;
        }
        let touched = aggregate(&pool, ts(60), ts(120)).await.unwrap();

        let five_min = touched
            .iter()
            .find(|r| r.bucket_width == BucketWidth::FiveMinutes)
            .unwrap();
        assert_eq!(five_min.request_count, 7);
        // p95([1..7]) = sorted[5] = 6
        assert_eq!(five_min.p95_latency_ms, 6);
    }

    #[tokio::test]
    async fn distinct_endpoints_produce_distinct_rollups() {
        let pool = init_test_db().await.unwrap();
        let project_id = seed_project(&pool).await;
        insert(&pool, project_id, "/a", 200, 10, 1).await;
        insert(&pool, project_id, "/b", 200, 20, 1).await;

        let touched = aggregate(&pool, ts(0), ts(60)).await.unwrap();
        let one_min: Vec<_> = touched
            .iter()
            .filter(|r| r.bucket_width == BucketWidth::OneMinute)
            .collect();
        assert_eq!(one_min.len(), 2);
    }
}
