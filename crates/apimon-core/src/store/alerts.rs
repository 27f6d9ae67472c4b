//! CRUD for alert events, including the transactional cooldown guard.

use chrono::{DateTime, Utc};

use super::models::AlertEvent;
use super::DbPool;
use crate::error::StorageError;

#[derive(sqlx::FromRow)]
struct AlertEventRow {
    id: i64,
    policy_id: i64,
    triggered_at: String,
    value: f64,
    resolved: bool,
}

impl AlertEventRow {
    fn into_event(self) -> AlertEvent {
        AlertEvent {
            id: self.id,
            policy_id: self.policy_id,
            triggered_at: self
                .triggered_at
                .parse()
                .expect("alert_events.triggered_at is always a valid RFC-3339 string"),
            value: self.value,
            resolved: self.resolved,
        }
    }
}

/// The most recent alert event for a policy, if any.
pub async fn latest_alert_event(
    pool: &DbPool,
    policy_id: i64,
) -> Result<Option<AlertEvent>, StorageError> {
    let row: Option<AlertEventRow> = sqlx::query_as(
        "SELECT id, policy_id, triggered_at, value, resolved FROM alert_events \
         WHERE policy_id = ? ORDER BY triggered_at DESC LIMIT 1",
    )
    .bind(policy_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(row.map(AlertEventRow::into_event))
}

/// Every alert event for any policy owned by a project, most recent first.
/// Backs the management read endpoint.
pub async fn list_alerts_for_project(
    pool: &DbPool,
    project_id: i64,
) -> Result<Vec<AlertEvent>, StorageError> {
    let rows: Vec<AlertEventRow> = sqlx::query_as(
        "SELECT e.id, e.policy_id, e.triggered_at, e.value, e.resolved FROM alert_events e \
         JOIN alert_policies p ON p.id = e.policy_id \
         WHERE p.project_id = ? ORDER BY e.triggered_at DESC",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(rows.into_iter().map(AlertEventRow::into_event).collect())
}

/// Append an alert event unconditionally.
pub async fn insert_alert_event(
    pool: &DbPool,
    policy_id: i64,
    triggered_at: DateTime<Utc>,
    value: f64,
) -> Result<AlertEvent, StorageError> {
    let id = sqlx::query(
        "INSERT INTO alert_events (policy_id, triggered_at, value, resolved) VALUES (?, ?, ?, 0)",
    )
    .bind(policy_id)
    .bind(triggered_at.to_rfc3339())
    .bind(value)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?
    .last_insert_rowid();

    Ok(AlertEvent {
        id,
        policy_id,
        triggered_at,
        value,
        resolved: false,
    })
}

/// Atomically re-check cooldown and insert, guarding against two concurrent
/// evaluators both observing "not cooling down" for the same rollup.
///
/// Re-reads `LatestAlertEvent` under the same transaction as the insert; if
/// the cooldown is found to have started after the caller's own check (a
/// concurrent winner), the insert is skipped and `Ok(None)` is returned.
/// `cooldown_minutes == 0` disables cooldown entirely.
pub async fn try_insert_if_not_cooling_down(
    pool: &DbPool,
    policy_id: i64,
    now: DateTime<Utc>,
    value: f64,
    cooldown_minutes: i64,
) -> Result<Option<AlertEvent>, StorageError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| StorageError::Connection { source: e })?;

    let last: Option<AlertEventRow> = sqlx::query_as(
        "SELECT id, policy_id, triggered_at, value, resolved FROM alert_events \
         WHERE policy_id = ? ORDER BY triggered_at DESC LIMIT 1",
    )
    .bind(policy_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    if cooldown_minutes > 0 {
        if let Some(last) = &last {
            let last_triggered_at: DateTime<Utc> = last
                .triggered_at
                .parse()
                .expect("alert_events.triggered_at is always a valid RFC-3339 string");
            let cooldown_ends = last_triggered_at + chrono::Duration::minutes(cooldown_minutes);
            if now < cooldown_ends {
                tx.commit()
                    .await
                    .map_err(|e| StorageError::Connection { source: e })?;
                return Ok(None);
            }
        }
    }

    let id = sqlx::query(
        "INSERT INTO alert_events (policy_id, triggered_at, value, resolved) VALUES (?, ?, ?, 0)",
    )
    .bind(policy_id)
    .bind(now.to_rfc3339())
    .bind(value)
    .execute(&mut *tx)
    .await
    .map_err(|e| StorageError::Query { source: e })?
    .last_insert_rowid();

    tx.commit()
        .await
        .map_err(|e| StorageError::Connection { source: e })?;

    Ok(Some(AlertEvent {
        id,
        policy_id,
        triggered_at: now,
        value,
        resolved: false,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{init_test_db, policies, projects};
    use crate::store::models::{Comparison, Metric, Severity};
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    async fn seed_policy(pool: &DbPool, cooldown_minutes: i64) -> i64 {
        let project_id = projects::create_project(pool, "Acme", None).await.unwrap().id;
        policies::create_policy(
            pool,
            project_id,
            "p95 too high",
            Metric::LatencyP95,
            Comparison::GreaterThan,
            100.0,
            Severity::Warn,
            cooldown_minutes,
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn latest_is_none_with_no_events() {
        let pool = init_test_db().await.unwrap();
        let policy_id = seed_policy(&pool, 15).await;
        assert!(latest_alert_event(&pool, policy_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_fire_always_succeeds() {
        let pool = init_test_db().await.unwrap();
        let policy_id = seed_policy(&pool, 15).await;

        let fired = try_insert_if_not_cooling_down(&pool, policy_id, ts(60), 150.0, 15)
            .await
            .unwrap();
        assert!(fired.is_some());
    }

    #[tokio::test]
    async fn second_fire_within_cooldown_is_suppressed() {
        let pool = init_test_db().await.unwrap();
        let policy_id = seed_policy(&pool, 15).await;

        try_insert_if_not_cooling_down(&pool, policy_id, ts(60), 150.0, 15)
            .await
            .unwrap();

        let suppressed = try_insert_if_not_cooling_down(&pool, policy_id, ts(120), 160.0, 15)
            .await
            .unwrap();
        assert!(suppressed.is_none());
    }

    #[tokio::test]
    async fn fire_after_cooldown_elapsed_succeeds() {
        let pool = init_test_db().await.unwrap();
        let policy_id = seed_policy(&pool, 15).await;

        try_insert_if_not_cooling_down(&pool, policy_id, ts(60), 150.0, 15)
            .await
            .unwrap();

        // cooldown ends at 60 + 15*60 = 960
        let fired = try_insert_if_not_cooling_down(&pool, policy_id, ts(961), 160.0, 15)
            .await
            .unwrap();
        assert!(fired.is_some());
    }

    #[tokio::test]
    async fn zero_cooldown_never_suppresses() {
        let pool = init_test_db().await.unwrap();
        let policy_id = seed_policy(&pool, 0).await;

        try_insert_if_not_cooling_down(&pool, policy_id, ts(60), 150.0, 0)
            .await
            .unwrap();
        let fired = try_insert_if_not_cooling_down(&pool, policy_id, ts(61), 150.0, 0)
            .await
            .unwrap();
        assert!(fired.is_some());
    }

    #[tokio::test]
    async fn list_for_project_joins_through_policy() {
        let pool = init_test_db().await.unwrap();
        let policy_id = seed_policy(&pool, 0).await;
        let project_id = sqlx::query_scalar::<_, i64>(
            "SELECT project_id FROM alert_policies WHERE id = ?",
        )
        .bind(policy_id)
        .fetch_one(&pool)
        .await
        .unwrap();

        try_insert_if_not_cooling_down(&pool, policy_id, ts(60), 150.0, 0)
            .await
            .unwrap();
        try_insert_if_not_cooling_down(&pool, policy_id, ts(120), 160.0, 0)
            .await
            .unwrap();

        let events = list_alerts_for_project(&pool, project_id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].triggered_at, ts(120), "most recent first");
    }
}
