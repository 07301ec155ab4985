//! Time source abstraction
//!
//! Detection logic never reads the wall clock on its own: hit feeds take the
//! current second from the caller, and only the passive rate query consults
//! an injected clock. Every code path stays deterministic under test.

use chrono::Utc;

/// Supplies the current unix time in whole seconds
pub trait Clock {
    /// Current unix time, truncated to seconds
    fn now_secs(&self) -> i64;
}

/// Wall-clock time source backed by chrono
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        Utc::now().timestamp()
    }
}
