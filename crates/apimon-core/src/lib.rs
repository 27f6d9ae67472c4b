//! Core library for the API performance monitoring service.
//!
//! Contains the time-series aggregation and alert-evaluation pipeline:
//! bucket math, typed storage, the aggregator, the policy evaluator, and the
//! minute-tick scheduler that drives them. The HTTP ingestion/management
//! surface lives in a separate crate; this crate is the core it calls into.
//! Alert events are recorded here but actually notifying anyone (email,
//! webhook, etc.) is out of scope — that's a collaborator this crate
//! doesn't own.
pub mod aggregator;
pub mod bucket;
pub mod clock;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod scheduler;
pub mod store;

pub use error::*;

/// Returns the version of the apimon-core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
