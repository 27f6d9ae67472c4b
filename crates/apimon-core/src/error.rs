//! Error types for the apimon core library.
//!
//! Each module has its own error enum to provide clear error boundaries.
//! The library uses `thiserror` for structured, typed errors.

/// Errors related to configuration loading, parsing, and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required configuration field is absent.
    #[error("missing required config field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration field has an unacceptable value.
    #[error("invalid value for config field '{field}': {message}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// A description of why the value is invalid.
        message: String,
    },

    /// The configuration file does not exist at the specified path.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// The path that was searched.
        path: String,
    },

    /// TOML deserialization failed.
    #[error("failed to parse config file: {source}")]
    ParseError {
        /// The underlying TOML parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Errors from SQLite storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to connect to SQLite database.
    #[error("database connection error: {source}")]
    Connection {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },

    /// Database migration failed.
    #[error("database migration error: {source}")]
    Migration {
        /// The underlying migration error.
        #[source]
        source: sqlx::migrate::MigrateError,
    },

    /// A database query failed.
    #[error("database query error: {source}")]
    Query {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },

    /// A stored row violates a core invariant (e.g. error_count > request_count).
    #[error("storage invariant violated: {message}")]
    InvariantViolation {
        /// Details about which invariant failed.
        message: String,
    },
}

/// Errors from the bucket aggregator.
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    /// The requested window is empty or inverted (`start >= end`).
    #[error("invalid aggregation window: start {start} is not before end {end}")]
    InvalidWindow {
        /// The window's start instant, formatted for display.
        start: String,
        /// The window's end instant, formatted for display.
        end: String,
    },

    /// Underlying storage failure while reading observations or upserting rollups.
    #[error("aggregator storage error: {source}")]
    Storage {
        /// The underlying storage error.
        #[source]
        source: StorageError,
    },
}

impl From<StorageError> for AggregatorError {
    fn from(source: StorageError) -> Self {
        AggregatorError::Storage { source }
    }
}

/// Errors from the policy evaluator.
///
/// Policy-level misconfiguration (unknown metric kind, unknown comparison) is
/// deliberately *not* represented here — per-policy errors are logged and the
/// offending policy is skipped, they never abort `Evaluate`. This enum only
/// carries failures that abort evaluation of the whole rollup.
#[derive(Debug, thiserror::Error)]
pub enum EvaluatorError {
    /// Underlying storage failure while loading policies, checking cooldown, or inserting an alert.
    #[error("evaluator storage error: {source}")]
    Storage {
        /// The underlying storage error.
        #[source]
        source: StorageError,
    },
}

impl From<StorageError> for EvaluatorError {
    fn from(source: StorageError) -> Self {
        EvaluatorError::Storage { source }
    }
}

/// Errors from the scheduler's tick loop.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A tick exceeded its deadline and was cancelled.
    #[error("tick exceeded its {deadline_secs}s deadline")]
    DeadlineExceeded {
        /// The configured deadline, in seconds.
        deadline_secs: u64,
    },

    /// A tick exhausted its retry budget and was dropped.
    #[error("tick for window starting at {window_start} dropped after {attempts} attempts: {message}")]
    RetriesExhausted {
        /// The window start that was being processed.
        window_start: String,
        /// Number of attempts made before giving up.
        attempts: u32,
        /// The error message from the final attempt.
        message: String,
    },
}
