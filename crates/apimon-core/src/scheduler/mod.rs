//! The minute-tick scheduler.
//!
//! Drives two independent jobs: a per-minute Aggregate+Evaluate tick, and a
//! periodic retention cleanup. Both run through [`job::run_with_retry`] with
//! their own backoff policy, and the tick itself is bounded by a deadline so
//! a stuck aggregation can never block the following minute's tick forever.

pub mod job;
pub mod runtime;

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::error::SchedulerError;
use crate::store::{observations, DbPool};
use job::RetryPolicy;

/// What a single successful tick accomplished, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub rollups_touched: usize,
    pub alerts_created: usize,
}

/// Configuration for the scheduler's retry and deadline behavior. Mirrors
/// the external-facing config knobs in `config::SchedulerConfig`.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_deadline: Duration,
    pub aggregate_retry: RetryPolicy,
    pub cleanup_retry: RetryPolicy,
    pub retention_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_deadline: Duration::from_secs(45),
            aggregate_retry: RetryPolicy::new(Duration::from_secs(10), 3),
            cleanup_retry: RetryPolicy::new(Duration::from_secs(30), 2),
            retention_days: 7,
        }
    }
}

/// Truncate `now` down to the start of its containing minute.
pub fn truncate_to_minute(now: DateTime<Utc>) -> DateTime<Utc> {
    crate::bucket::align(now, crate::bucket::BucketWidth::OneMinute)
}

/// Drives the tick loop and the cleanup job against a store and clock.
pub struct Scheduler {
    pool: DbPool,
    clock: std::sync::Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(pool: DbPool, clock: std::sync::Arc<dyn Clock>, config: SchedulerConfig) -> Self {
        Self { pool, clock, config }
    }

    /// Run one minute-tick: Aggregate the just-closed window, then Evaluate
    /// every rollup it touched. Retries the aggregate step on failure;
    /// evaluation failures for one policy/rollup never abort the others
    /// (handled inside `evaluator::evaluate`), so only storage-wide failures
    /// reach this retry loop.
    ///
    /// The whole tick is bounded by `config.tick_deadline` — if exceeded,
    /// returns `SchedulerError::DeadlineExceeded` without waiting further.
    pub async fn tick(&self) -> Result<TickSummary, SchedulerError> {
        let deadline = self.config.tick_deadline;
        match tokio::time::timeout(deadline, self.tick_inner()).await {
            Ok(result) => result,
            Err(_) => Err(SchedulerError::DeadlineExceeded {
                deadline_secs: deadline.as_secs(),
            }),
        }
    }

    async fn tick_inner(&self) -> Result<TickSummary, SchedulerError> {
        let now = self.clock.now();
        let end = truncate_to_minute(now);
        let start = end - chrono::Duration::minutes(1);

        let rollups = job::run_with_retry(&self.config.aggregate_retry, || {
            crate::aggregator::aggregate(&self.pool, start, end)
        })
        .await
        .map_err(|(attempts, source)| {
            SchedulerError::RetriesExhausted {
                window_start: start.to_rfc3339(),
                attempts,
                message: source.to_string(),
            }
        })?;

        let mut alerts_created = 0;
        for rollup in &rollups {
            let created = job::run_with_retry(&self.config.aggregate_retry, || {
                crate::evaluator::evaluate(&self.pool, self.clock.as_ref(), rollup)
            })
            .await
            .map_err(|(attempts, source)| SchedulerError::RetriesExhausted {
                window_start: start.to_rfc3339(),
                attempts,
                message: source.to_string(),
            })?;
            alerts_created += created;
        }

        Ok(TickSummary {
            rollups_touched: rollups.len(),
            alerts_created,
        })
    }

    /// Delete observations older than the retention window. Independent of
    /// the tick loop and safe to run on its own cadence (default daily).
    pub async fn run_cleanup(&self) -> Result<u64, SchedulerError> {
        let cutoff = self.clock.now() - chrono::Duration::days(self.config.retention_days);

        job::run_with_retry(&self.config.cleanup_retry, || {
            observations::delete_observations_before(&self.pool, cutoff)
        })
        .await
        .map_err(|(attempts, source)| SchedulerError::RetriesExhausted {
            window_start: cutoff.to_rfc3339(),
            attempts,
            message: source.to_string(),
        })
    }

    /// Run the tick loop forever, once per minute, until `cancel` fires.
    /// A tick that returns an error is logged and the loop continues — a
    /// single bad minute never brings the scheduler down.
    pub async fn run_forever(&self, cancel: tokio_util::sync::CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("scheduler stopping");
                    return;
                }
                _ = interval.tick() => {
                    match self.tick().await {
                        Ok(summary) => {
                            tracing::info!(
                                rollups = summary.rollups_touched,
                                alerts = summary.alerts_created,
                                "tick completed"
                            );
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "tick failed");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::models::{Comparison, Metric, NewObservation, Severity};
    use crate::store::{init_test_db, policies, projects};
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            tick_deadline: Duration::from_secs(45),
            aggregate_retry: RetryPolicy::new(Duration::from_millis(1), 3),
            cleanup_retry: RetryPolicy::new(Duration::from_millis(1), 2),
            retention_days: 7,
        }
    }

    #[tokio::test]
    async fn tick_with_no_observations_touches_nothing() {
        let pool = init_test_db().await.unwrap();
        let clock = std::sync::Arc::new(FixedClock::new(ts(60)));
        let scheduler = Scheduler::new(pool, clock, fast_config());

        let summary = scheduler.tick().await.unwrap();
        assert_eq!(summary.rollups_touched, 0);
        assert_eq!(summary.alerts_created, 0);
    }

    #[tokio::test]
    async fn tick_aggregates_and_evaluates_the_closed_minute() {
        let pool = init_test_db().await.unwrap();
        let project_id = projects::create_project(&pool, "Acme", None).await.unwrap().id;
        policies::create_policy(
            &pool,
            project_id,
            "p95 too high",
            Metric::LatencyP95,
            Comparison::GreaterThan,
            100.0,
            Severity::Warn,
            0,
        )
        .await
        .unwrap();

        observations::insert_observation(
            &pool,
            &NewObservation {
                project_id,
                endpoint: "/a".to_string(),
                method: "GET".to_string(),
                status_code: 200,
                latency_ms: 500,
                timestamp: ts(30),
            },
        )
        .await
        .unwrap();

        // now = 60s => tick closes the [0, 60) window.
        let clock = std::sync::Arc::new(FixedClock::new(ts(60)));
        let scheduler = Scheduler::new(pool, clock, fast_config());

        let summary = scheduler.tick().await.unwrap();
        assert_eq!(summary.rollups_touched, 3); // one per bucket width
        assert_eq!(summary.alerts_created, 1);
    }

    #[tokio::test]
    async fn cleanup_removes_observations_past_retention() {
        let pool = init_test_db().await.unwrap();
        let project_id = projects::create_project(&pool, "Acme", None).await.unwrap().id;

        observations::insert_observation(
            &pool,
            &NewObservation {
                project_id,
                endpoint: "/a".to_string(),
                method: "GET".to_string(),
                status_code: 200,
                latency_ms: 10,
                timestamp: ts(0),
            },
        )
        .await
        .unwrap();

        let eight_days_secs = 8 * 24 * 60 * 60;
        let clock = std::sync::Arc::new(FixedClock::new(ts(eight_days_secs)));
        let mut config = fast_config();
        config.retention_days = 7;
        let scheduler = Scheduler::new(pool.clone(), clock, config);

        let deleted = scheduler.run_cleanup().await.unwrap();
        assert_eq!(deleted, 1);

        let remaining = observations::range_observations(&pool, ts(0), ts(eight_days_secs + 1))
            .await
            .unwrap();
        assert!(remaining.is_empty());
    }

    #[test]
    fn truncate_to_minute_rounds_down() {
        assert_eq!(truncate_to_minute(ts(95)), ts(60));
        assert_eq!(truncate_to_minute(ts(60)), ts(60));
    }
}
