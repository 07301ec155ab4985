//! Trailing-window hit counter
//!
//! Tracks per-second hit counts for one monitored entity in a fixed circular
//! buffer and reports the minimum count sustained across the whole window.
//! Useful for rate readouts that must not flap on short bursts.
//!
//! # Algorithm
//!
//! Each slot holds one second's hit count. When the feed moves to the next
//! second the buffer rotates: the minimum over the window as it stood becomes
//! the published rate, and the slot for the new second starts at zero.
//! Publishing the minimum (not the average or the peak) means a nonzero rate
//! only ever appears after the pressure has held for the entire window, so an
//! isolated one-second spike can never produce a nonzero estimate.
//!
//! Only consecutive seconds count: a gap of more than one second between hits
//! resets the window to the zero state before the new hit is recorded.

use shared::MonitorTarget;

/// Window length, in seconds, used by the per-entity monitors.
pub const TRAILING_WINDOW_SECS: usize = 3;

/// Circular buffer of per-second hit counts with a sustained-minimum readout.
///
/// `WINDOW_SECS` is the number of one-second slots and must be at least 1,
/// enforced at compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailingWindowCounter<const WINDOW_SECS: usize> {
    /// Per-second hit counts; `index` marks the slot for the current second
    window: [u16; WINDOW_SECS],
    /// Minimum across the window as of the last rotation
    window_min: u16,
    /// Current write position
    index: usize,
    /// Unix second of the most recent recorded hit
    last_hit: i64,
}

impl<const WINDOW_SECS: usize> TrailingWindowCounter<WINDOW_SECS> {
    /// Create a counter in the zero state
    pub fn new() -> Self {
        const {
            assert!(WINDOW_SECS > 0, "window must have at least one slot");
        }

        Self {
            window: [0; WINDOW_SECS],
            window_min: 0,
            index: 0,
            last_hit: 0,
        }
    }

    /// Zero every slot and restart the window at `at`.
    ///
    /// Runs at construction and whenever a gap in the hit stream invalidates
    /// the current run.
    pub fn reset(&mut self, at: i64) {
        self.window = [0; WINDOW_SECS];
        self.window_min = 0;
        self.index = 0;
        self.last_hit = at;
    }

    /// Record one hit at unix second `when`.
    ///
    /// `when` comes from the caller's event feed, not from the wall clock.
    /// `target` identifies the monitored entity for diagnostics only and
    /// never influences the counts. The per-slot count saturates at
    /// `u16::MAX` rather than wrapping.
    pub fn record_hit(&mut self, when: i64, target: &MonitorTarget) {
        if when - self.last_hit > 1 {
            // Run broken: only consecutive seconds feed the window
            tracing::debug!(
                entity = %target,
                when = when,
                last_hit = self.last_hit,
                "Gap in hit stream, resetting window"
            );
            #[cfg(feature = "metrics")]
            metrics::counter!("alert_engine.window_resets").increment(1);

            self.reset(when);
        }

        if when - self.last_hit == 1 {
            // Rotation: publish the minimum over the window as it stood,
            // then open a fresh slot for the new second
            self.window_min = self.window.iter().copied().min().unwrap_or(0);
            self.index = (self.index + 1) % WINDOW_SECS;
            self.window[self.index] = 0;
            self.last_hit = when;
        }

        self.window[self.index] = self.window[self.index].saturating_add(1);

        tracing::trace!(
            entity = %target,
            when = when,
            slot = self.index,
            count = self.window[self.index],
            window_min = self.window_min,
            "Recorded hit"
        );
    }

    /// Minimum hit count sustained across the whole trailing window.
    ///
    /// Returns 0 when the window is stale, i.e. `now` is more than one second
    /// past the last recorded hit. `now` is supplied by the caller; this type
    /// never reads the wall clock.
    pub fn current_rate(&self, now: i64) -> u16 {
        if now - self.last_hit > 1 {
            return 0;
        }

        self.window_min
    }
}

impl<const WINDOW_SECS: usize> Default for TrailingWindowCounter<WINDOW_SECS> {
    fn default() -> Self {
        Self::new()
    }
}
