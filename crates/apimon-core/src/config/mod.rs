//! Configuration for the monitoring service.
//!
//! Supports three-layer configuration loading:
//! 1. Built-in defaults
//! 2. TOML config file (`~/.apimon/config.toml`)
//! 3. Environment variable overrides (`APIMON_` prefix)
//!
//! CLI flag overrides are applied by the binary crates after loading.

mod defaults;

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use defaults::*;

/// Top-level configuration for the monitoring service.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Data storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Scheduler tick cadence, retry, and deadline settings.
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// HTTP server bind address.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging verbosity.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Data storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Number of days to retain raw observations before cleanup deletes them.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            retention_days: default_retention_days(),
        }
    }
}

/// Scheduler tick cadence, retry, and deadline settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerSettings {
    /// Seconds between aggregation ticks (the minute boundary cadence).
    #[serde(default = "default_aggregation_period_secs")]
    pub aggregation_period_secs: u64,

    /// Seconds between retention cleanup runs.
    #[serde(default = "default_cleanup_period_secs")]
    pub cleanup_period_secs: u64,

    /// Base backoff delay for a failed aggregate+evaluate tick, in seconds.
    #[serde(default = "default_aggregate_retry_base_secs")]
    pub aggregate_retry_base_secs: u64,

    /// Maximum retry attempts for a failed tick before it is dropped.
    #[serde(default = "default_aggregate_max_retries")]
    pub aggregate_max_retries: u32,

    /// Base backoff delay for a failed cleanup run, in seconds.
    #[serde(default = "default_cleanup_retry_base_secs")]
    pub cleanup_retry_base_secs: u64,

    /// Maximum retry attempts for a failed cleanup run before it is dropped.
    #[serde(default = "default_cleanup_max_retries")]
    pub cleanup_max_retries: u32,

    /// Per-tick deadline in seconds; exceeding it cancels the tick and
    /// counts as a failed attempt.
    #[serde(default = "default_tick_deadline_secs")]
    pub tick_deadline_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            aggregation_period_secs: default_aggregation_period_secs(),
            cleanup_period_secs: default_cleanup_period_secs(),
            aggregate_retry_base_secs: default_aggregate_retry_base_secs(),
            aggregate_max_retries: default_aggregate_max_retries(),
            cleanup_retry_base_secs: default_cleanup_retry_base_secs(),
            cleanup_max_retries: default_cleanup_max_retries(),
            tick_deadline_secs: default_tick_deadline_secs(),
        }
    }
}

impl SchedulerSettings {
    /// Build a [`crate::scheduler::SchedulerConfig`] from these settings.
    ///
    /// `retention_days` comes from `StorageConfig` rather than from these
    /// settings themselves, so callers pass it in explicitly.
    pub fn to_scheduler_config(&self, retention_days: i64) -> crate::scheduler::SchedulerConfig {
        crate::scheduler::SchedulerConfig {
            tick_deadline: std::time::Duration::from_secs(self.tick_deadline_secs),
            aggregate_retry: crate::scheduler::job::RetryPolicy::new(
                std::time::Duration::from_secs(self.aggregate_retry_base_secs),
                self.aggregate_max_retries,
            ),
            cleanup_retry: crate::scheduler::job::RetryPolicy::new(
                std::time::Duration::from_secs(self.cleanup_retry_base_secs),
                self.cleanup_max_retries,
            ),
            retention_days,
        }
    }
}

/// HTTP server bind address.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Logging verbosity.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `RUST_LOG`-style filter directive override. Empty means "use the
    /// binary's own default".
    #[serde(default)]
    pub filter: String,
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// The loading sequence:
    /// 1. Determine config file path (argument > `APIMON_CONFIG` env var > default)
    /// 2. Parse TOML file (or use defaults if the default path doesn't exist)
    /// 3. Apply environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Config, ConfigError> {
        let (path, explicit) = Self::resolve_config_path(config_path);

        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str::<Config>(&contents)
                .map_err(|e| ConfigError::ParseError { source: e })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if explicit {
                    return Err(ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    });
                }
                Config::default()
            }
            Err(_) => {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
        };

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Load configuration and validate it, returning all validation errors at once.
    pub fn load_and_validate(config_path: Option<&str>) -> Result<Config, Vec<ConfigError>> {
        let config = Config::load(config_path).map_err(|e| vec![e])?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, returning all errors found (not just the first).
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.storage.retention_days <= 0 {
            errors.push(ConfigError::InvalidValue {
                field: "storage.retention_days".to_string(),
                message: "must be positive".to_string(),
            });
        }

        if self.scheduler.aggregation_period_secs == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "scheduler.aggregation_period_secs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.scheduler.tick_deadline_secs >= self.scheduler.aggregation_period_secs {
            errors.push(ConfigError::InvalidValue {
                field: "scheduler.tick_deadline_secs".to_string(),
                message: "must be less than scheduler.aggregation_period_secs".to_string(),
            });
        }

        if self.scheduler.aggregate_max_retries == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "scheduler.aggregate_max_retries".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.scheduler.cleanup_max_retries == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "scheduler.cleanup_max_retries".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.server.port == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "must be between 1 and 65535".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Resolve the config file path from arguments, env vars, or default.
    ///
    /// Returns `(path, explicit)` where `explicit` is true if the path was
    /// explicitly provided (via argument or env var) rather than using the default.
    fn resolve_config_path(config_path: Option<&str>) -> (PathBuf, bool) {
        if let Some(path) = config_path {
            return (expand_tilde(path), true);
        }

        if let Ok(env_path) = env::var("APIMON_CONFIG") {
            return (expand_tilde(&env_path), true);
        }

        (expand_tilde("~/.apimon/config.toml"), false)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables use the `APIMON_` prefix with double
    /// underscores separating nested keys (e.g., `APIMON_STORAGE__DB_PATH`).
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = env::var("APIMON_STORAGE__DB_PATH") {
            self.storage.db_path = val;
        }
        if let Ok(val) = env::var("APIMON_STORAGE__RETENTION_DAYS") {
            self.storage.retention_days = parse_env_i64("APIMON_STORAGE__RETENTION_DAYS", &val)?;
        }

        if let Ok(val) = env::var("APIMON_SCHEDULER__AGGREGATION_PERIOD_SECS") {
            self.scheduler.aggregation_period_secs =
                parse_env_u64("APIMON_SCHEDULER__AGGREGATION_PERIOD_SECS", &val)?;
        }
        if let Ok(val) = env::var("APIMON_SCHEDULER__CLEANUP_PERIOD_SECS") {
            self.scheduler.cleanup_period_secs =
                parse_env_u64("APIMON_SCHEDULER__CLEANUP_PERIOD_SECS", &val)?;
        }
        if let Ok(val) = env::var("APIMON_SCHEDULER__AGGREGATE_RETRY_BASE_SECS") {
            self.scheduler.aggregate_retry_base_secs =
                parse_env_u64("APIMON_SCHEDULER__AGGREGATE_RETRY_BASE_SECS", &val)?;
        }
        if let Ok(val) = env::var("APIMON_SCHEDULER__AGGREGATE_MAX_RETRIES") {
            self.scheduler.aggregate_max_retries =
                parse_env_u32("APIMON_SCHEDULER__AGGREGATE_MAX_RETRIES", &val)?;
        }
        if let Ok(val) = env::var("APIMON_SCHEDULER__CLEANUP_RETRY_BASE_SECS") {
            self.scheduler.cleanup_retry_base_secs =
                parse_env_u64("APIMON_SCHEDULER__CLEANUP_RETRY_BASE_SECS", &val)?;
        }
        if let Ok(val) = env::var("APIMON_SCHEDULER__CLEANUP_MAX_RETRIES") {
            self.scheduler.cleanup_max_retries =
                parse_env_u32("APIMON_SCHEDULER__CLEANUP_MAX_RETRIES", &val)?;
        }
        if let Ok(val) = env::var("APIMON_SCHEDULER__TICK_DEADLINE_SECS") {
            self.scheduler.tick_deadline_secs =
                parse_env_u64("APIMON_SCHEDULER__TICK_DEADLINE_SECS", &val)?;
        }

        if let Ok(val) = env::var("APIMON_SERVER__HOST") {
            self.server.host = val;
        }
        if let Ok(val) = env::var("APIMON_SERVER__PORT") {
            self.server.port = parse_env_u16("APIMON_SERVER__PORT", &val)?;
        }

        if let Ok(val) = env::var("APIMON_LOGGING__FILTER") {
            self.logging.filter = val;
        }

        Ok(())
    }
}

/// Expand `~` at the start of a path to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

fn parse_env_u16(var_name: &str, val: &str) -> Result<u16, ConfigError> {
    val.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
        field: var_name.to_string(),
        message: format!("'{val}' is not a valid u16"),
    })
}

fn parse_env_u32(var_name: &str, val: &str) -> Result<u32, ConfigError> {
    val.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
        field: var_name.to_string(),
        message: format!("'{val}' is not a valid u32"),
    })
}

fn parse_env_u64(var_name: &str, val: &str) -> Result<u64, ConfigError> {
    val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        field: var_name.to_string(),
        message: format!("'{val}' is not a valid u64"),
    })
}

fn parse_env_i64(var_name: &str, val: &str) -> Result<i64, ConfigError> {
    val.parse::<i64>().map_err(|_| ConfigError::InvalidValue {
        field: var_name.to_string(),
        message: format!("'{val}' is not a valid i64"),
    })
}
