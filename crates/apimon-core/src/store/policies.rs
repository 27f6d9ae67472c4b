//! CRUD for alert policies.

use super::models::{AlertPolicy, Comparison, Metric, Severity};
use super::DbPool;
use crate::error::StorageError;

#[derive(sqlx::FromRow)]
struct PolicyRow {
    id: i64,
    project_id: i64,
    name: String,
    metric: String,
    comparison: String,
    threshold: f64,
    severity: String,
    cooldown_minutes: i64,
    is_active: bool,
}

impl PolicyRow {
    /// Parse a stored row into a typed policy. A row with an unrecognized
    /// metric/comparison/severity code is a misconfigured policy, not a
    /// crash: it's logged and skipped so the rest of the project's policies
    /// still evaluate.
    fn into_policy(self) -> Option<AlertPolicy> {
        let metric = match Metric::from_code(&self.metric) {
            Some(m) => m,
            None => {
                tracing::warn!(policy_id = self.id, metric = %self.metric, "unknown metric code, skipping policy");
                return None;
            }
        };
        let comparison = match Comparison::from_code(&self.comparison) {
            Some(c) => c,
            None => {
                tracing::warn!(policy_id = self.id, comparison = %self.comparison, "unknown comparison code, skipping policy");
                return None;
            }
        };
        let severity = match Severity::from_code(&self.severity) {
            Some(s) => s,
            None => {
                tracing::warn!(policy_id = self.id, severity = %self.severity, "unknown severity code, skipping policy");
                return None;
            }
        };

        Some(AlertPolicy {
            id: self.id,
            project_id: self.project_id,
            name: self.name,
            metric,
            comparison,
            threshold: self.threshold,
            severity,
            cooldown_minutes: self.cooldown_minutes,
            is_active: self.is_active,
        })
    }
}

/// Snapshot of every active policy for a project, as of the call.
pub async fn list_active_policies(
    pool: &DbPool,
    project_id: i64,
) -> Result<Vec<AlertPolicy>, StorageError> {
    let rows: Vec<PolicyRow> = sqlx::query_as(
        "SELECT id, project_id, name, metric, comparison, threshold, severity, cooldown_minutes, is_active \
         FROM alert_policies WHERE project_id = ? AND is_active = 1",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(rows.into_iter().filter_map(PolicyRow::into_policy).collect())
}

/// Every policy for a project, active or not. Backs the management read
/// endpoint; the core itself only ever calls `list_active_policies`.
pub async fn list_policies_for_project(
    pool: &DbPool,
    project_id: i64,
) -> Result<Vec<AlertPolicy>, StorageError> {
    let rows: Vec<PolicyRow> = sqlx::query_as(
        "SELECT id, project_id, name, metric, comparison, threshold, severity, cooldown_minutes, is_active \
         FROM alert_policies WHERE project_id = ? ORDER BY id",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?;

    Ok(rows.into_iter().filter_map(PolicyRow::into_policy).collect())
}

/// Create a policy. Part of the out-of-scope management surface; the core
/// only ever reads policies.
#[allow(clippy::too_many_arguments)]
pub async fn create_policy(
    pool: &DbPool,
    project_id: i64,
    name: &str,
    metric: Metric,
    comparison: Comparison,
    threshold: f64,
    severity: Severity,
    cooldown_minutes: i64,
) -> Result<AlertPolicy, StorageError> {
    let id = sqlx::query(
        "INSERT INTO alert_policies (project_id, name, metric, comparison, threshold, severity, cooldown_minutes, is_active) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 1)",
    )
    .bind(project_id)
    .bind(name)
    .bind(metric.code())
    .bind(comparison.code())
    .bind(threshold)
    .bind(severity.code())
    .bind(cooldown_minutes)
    .execute(pool)
    .await
    .map_err(|e| StorageError::Query { source: e })?
    .last_insert_rowid();

    Ok(AlertPolicy {
        id,
        project_id,
        name: name.to_string(),
        metric,
        comparison,
        threshold,
        severity,
        cooldown_minutes,
        is_active: true,
    })
}

/// Flip a policy's `is_active` flag.
pub async fn set_policy_active(
    pool: &DbPool,
    policy_id: i64,
    is_active: bool,
) -> Result<(), StorageError> {
    sqlx::query("UPDATE alert_policies SET is_active = ? WHERE id = ?")
        .bind(is_active)
        .bind(policy_id)
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;
    Ok(())
}
