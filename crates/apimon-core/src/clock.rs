//! Injected wall-clock time.
//!
//! The evaluator's cooldown test and the scheduler's window computation both
//! need "now" — instead of calling `Utc::now()` directly, they take a
//! `&dyn Clock`, so tests can advance time deterministically.

use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Something that can report the current wall-clock time.
pub trait Clock: Send + Sync {
    /// The current UTC instant.
    fn now(&self) -> DateTime<Utc>;
}

/// A clock backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that returns a fixed instant until manually advanced.
///
/// Used by tests that exercise cooldown/retry timing without sleeping.
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock starting at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Move the clock forward by `duration`.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut guard = self.current.lock().expect("fixed clock mutex poisoned");
        *guard += duration;
    }

    /// Set the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut guard = self.current.lock().expect("fixed clock mutex poisoned");
        *guard = instant;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().expect("fixed clock mutex poisoned")
    }
}
