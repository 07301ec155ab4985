//! Per-entity rate monitor
//!
//! One value per monitored entity, combining the trailing-window rate
//! estimate with the sustained-trespass alarm behind a single construction
//! path. The two detectors stay independent: `record_hit` feeds only the
//! window, `inc_hits` feeds only the alarm. Callers wire their event stream
//! to whichever view they need.
//!
//! The monitor also carries the injected [`Clock`] used by the passive rate
//! query, so embedding services get wall-clock behavior by default while
//! tests drive time explicitly.

use anyhow::Result;
use serde_json::Value;
use shared::{MonitorConfig, MonitorTarget};

use crate::clock::{Clock, SystemClock};
use crate::detectors::{
    TrailingWindowCounter, TrespassDetector, TrespassSnapshot, TRAILING_WINDOW_SECS,
};

/// Tracks one entity's hit rate and trespass alarm
#[derive(Debug, Clone)]
pub struct HitRateMonitor<C: Clock = SystemClock> {
    /// Conservative sustained-rate estimate
    window: TrailingWindowCounter<TRAILING_WINDOW_SECS>,
    /// Debounced over-threshold alarm
    detector: TrespassDetector,
    /// Time source for the passive rate query
    clock: C,
}

impl HitRateMonitor<SystemClock> {
    /// Create a monitor with the given thresholds and the system clock.
    ///
    /// A `required_consecutive_seconds` of 0 is clamped to 1.
    pub fn new(max_hits_per_sec: u32, required_consecutive_seconds: u8) -> Self {
        Self::with_clock(max_hits_per_sec, required_consecutive_seconds, SystemClock)
    }

    /// Create a monitor from loaded configuration
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.max_hits_per_sec, config.required_consecutive_secs)
    }
}

impl Default for HitRateMonitor<SystemClock> {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

impl<C: Clock> HitRateMonitor<C> {
    /// Create a monitor with an explicit time source
    pub fn with_clock(max_hits_per_sec: u32, required_consecutive_seconds: u8, clock: C) -> Self {
        Self {
            window: TrailingWindowCounter::new(),
            detector: TrespassDetector::new(max_hits_per_sec, required_consecutive_seconds),
            clock,
        }
    }

    /// Replace the alarm thresholds and restart the trespass run.
    ///
    /// The trailing window is untouched: thresholds do not change what the
    /// rate estimate means.
    pub fn reset_thresholds(&mut self, max_hits_per_sec: u32, required_consecutive_seconds: u8) {
        self.detector
            .reset_thresholds(max_hits_per_sec, required_consecutive_seconds);
    }

    /// Record one hit at unix second `when` in the trailing window.
    ///
    /// `target` identifies the monitored entity in diagnostics only.
    pub fn record_hit(&mut self, when: i64, target: &MonitorTarget) {
        self.window.record_hit(when, target);
    }

    /// Feed one hit at unix second `when` to the trespass detector.
    ///
    /// Returns the alarm flag after this hit; see
    /// [`TrespassDetector::inc_hits`].
    pub fn inc_hits(&mut self, when: i64) -> bool {
        self.detector.inc_hits(when)
    }

    /// Sustained rate right now, read against the injected clock
    pub fn current_rate(&self) -> u16 {
        self.window.current_rate(self.clock.now_secs())
    }

    /// Sustained rate at an explicit instant
    pub fn current_rate_at(&self, now: i64) -> u16 {
        self.window.current_rate(now)
    }

    /// Alarm flag as of the last [`inc_hits`](Self::inc_hits) call
    pub fn is_trespassed(&self) -> bool {
        self.detector.is_trespassed()
    }

    /// Point-in-time copy of the trespass detector state
    pub fn snapshot(&self) -> TrespassSnapshot {
        self.detector.snapshot()
    }

    /// Trespass detector state as a JSON object under `key`.
    ///
    /// An empty `key` falls back to the default export key.
    ///
    /// # Errors
    ///
    /// Returns an error if the state fails to serialize.
    pub fn export_state(&self, key: &str) -> Result<Value> {
        self.detector.export_state(key)
    }
}
