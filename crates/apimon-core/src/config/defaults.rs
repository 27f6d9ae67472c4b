//! Default values for configuration fields, used as serde defaults and by
//! `Config::default()`.

pub fn default_db_path() -> String {
    "~/.apimon/apimon.db".to_string()
}

pub fn default_retention_days() -> i64 {
    7
}

pub fn default_aggregation_period_secs() -> u64 {
    60
}

pub fn default_cleanup_period_secs() -> u64 {
    24 * 60 * 60
}

pub fn default_aggregate_retry_base_secs() -> u64 {
    10
}

pub fn default_aggregate_max_retries() -> u32 {
    3
}

pub fn default_cleanup_retry_base_secs() -> u64 {
    30
}

pub fn default_cleanup_max_retries() -> u32 {
    2
}

pub fn default_tick_deadline_secs() -> u64 {
    45
}

pub fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_server_port() -> u16 {
    8080
}
