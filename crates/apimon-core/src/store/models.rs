//! Typed records for every persisted entity.
//!
//! These are plain data — no behavior, no lazy loading. Each maps onto one
//! row (or, for `Rollup`, one identity key) and is produced/consumed by the
//! functions in the sibling `store` submodules.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::bucket::BucketWidth;

/// A tenant. Owns observations, rollups, policies, and (transitively) alerts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub notification_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One recorded request outcome, as pushed by the ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub project_id: i64,
    pub endpoint: String,
    pub method: String,
    pub status_code: i32,
    pub latency_ms: i64,
    pub timestamp: DateTime<Utc>,
}

/// A new observation prior to insertion (no surrogate fields besides the ones
/// the caller supplies).
#[derive(Debug, Clone, PartialEq)]
pub struct NewObservation {
    pub project_id: i64,
    pub endpoint: String,
    pub method: String,
    pub status_code: i32,
    pub latency_ms: i64,
    pub timestamp: DateTime<Utc>,
}

/// An aggregated bucket of observations for one (project, endpoint) pair.
///
/// Identity key: `(project_id, endpoint, bucket_start, bucket_width)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rollup {
    pub project_id: i64,
    pub endpoint: String,
    pub bucket_start: DateTime<Utc>,
    pub bucket_width: BucketWidth,
    pub request_count: i64,
    pub error_count: i64,
    pub p95_latency_ms: i64,
}

impl Rollup {
    /// `request_count >= error_count >= 0`.
    pub fn counts_are_valid(&self) -> bool {
        self.request_count >= self.error_count && self.error_count >= 0
    }
}

/// The metric kind a policy's threshold applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    LatencyP95,
    ErrorRate,
    Throughput,
}

impl Metric {
    pub fn from_code(code: &str) -> Option<Metric> {
        match code {
            "latency_p95" => Some(Metric::LatencyP95),
            "error_rate" => Some(Metric::ErrorRate),
            "throughput" => Some(Metric::Throughput),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Metric::LatencyP95 => "latency_p95",
            Metric::ErrorRate => "error_rate",
            Metric::Throughput => "throughput",
        }
    }
}

impl Serialize for Metric {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.code())
    }
}

/// The comparison operator a policy's threshold test uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterThan,
    LessThan,
}

impl Comparison {
    pub fn from_code(code: &str) -> Option<Comparison> {
        match code {
            ">" => Some(Comparison::GreaterThan),
            "<" => Some(Comparison::LessThan),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Comparison::GreaterThan => ">",
            Comparison::LessThan => "<",
        }
    }

    /// Evaluate `value <op> threshold`.
    pub fn test(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::GreaterThan => value > threshold,
            Comparison::LessThan => value < threshold,
        }
    }
}

impl Serialize for Comparison {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.code())
    }
}

/// Severity an alert is tagged with; purely informational for the notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Critical,
}

impl Severity {
    pub fn from_code(code: &str) -> Option<Severity> {
        match code {
            "info" => Some(Severity::Info),
            "warn" => Some(Severity::Warn),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Critical => "critical",
        }
    }
}

impl Serialize for Severity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.code())
    }
}

/// A user-declared condition over a derived metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertPolicy {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub metric: Metric,
    pub comparison: Comparison,
    pub threshold: f64,
    pub severity: Severity,
    pub cooldown_minutes: i64,
    pub is_active: bool,
}

/// A firing of an `AlertPolicy`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub id: i64,
    pub policy_id: i64,
    pub triggered_at: DateTime<Utc>,
    pub value: f64,
    pub resolved: bool,
}

/// A new alert event prior to insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlertEvent {
    pub policy_id: i64,
    pub triggered_at: DateTime<Utc>,
    pub value: f64,
}
