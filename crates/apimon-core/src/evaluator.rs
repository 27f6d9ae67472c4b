//! The policy evaluator.
//!
//! Evaluation order, per policy:
//! 1. Resolve the metric value from the rollup. Unknown metric kinds are
//!    policy-level errors — logged and skipped, never abort the loop.
//! 2. Threshold test.
//! 3. Cooldown test, re-checked transactionally at insert time.
//! 4. Insert the alert event.
//!
//! A policy does not declare a bucket width, so a rollup at any width can
//! trigger it; the evaluator is invoked once per rollup regardless of width.
//! This duplication is intentional and damped by cooldown.

use crate::clock::Clock;
use crate::error::EvaluatorError;
use crate::store::models::{AlertPolicy, Comparison, Metric, Rollup};
use crate::store::{alerts, policies, DbPool};

/// Derive the metric value a policy's threshold test compares against.
fn resolve_metric_value(metric: Metric, rollup: &Rollup) -> f64 {
    match metric {
        Metric::LatencyP95 => rollup.p95_latency_ms as f64,
        Metric::ErrorRate => {
            if rollup.request_count == 0 {
                0.0
            } else {
                rollup.error_count as f64 / rollup.request_count as f64
            }
        }
        Metric::Throughput => rollup.request_count as f64,
    }
}

fn threshold_test(comparison: Comparison, value: f64, threshold: f64) -> bool {
    comparison.test(value, threshold)
}

/// Evaluate every active policy for `rollup.project_id` against `rollup`,
/// inserting an alert event for each one that fires. Returns the number of
/// alerts created.
pub async fn evaluate(
    pool: &DbPool,
    clock: &dyn Clock,
    rollup: &Rollup,
) -> Result<usize, EvaluatorError> {
    let active = policies::list_active_policies(pool, rollup.project_id).await?;

    let mut created = 0;
    for policy in active {
        if evaluate_one(pool, clock, &policy, rollup).await? {
            created += 1;
        }
    }
    Ok(created)
}

async fn evaluate_one(
    pool: &DbPool,
    clock: &dyn Clock,
    policy: &AlertPolicy,
    rollup: &Rollup,
) -> Result<bool, EvaluatorError> {
    let value = resolve_metric_value(policy.metric, rollup);

    if !threshold_test(policy.comparison, value, policy.threshold) {
        return Ok(false);
    }

    let now = clock.now();
    let fired = alerts::try_insert_if_not_cooling_down(
        pool,
        policy.id,
        now,
        value,
        policy.cooldown_minutes,
    )
    .await?;

    Ok(fired.is_some())
}
