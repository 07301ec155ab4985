//! Sustained-rate trespass detector
//!
//! State machine that raises a one-shot alarm when the per-second hit count
//! of a monitored entity stays above a configured threshold for more than the
//! required number of consecutive seconds. Re-emission is debounced with a
//! grace period so a persistent offender produces one alarm per minute, not
//! one per hit.
//!
//! # State Machine
//!
//! ```text
//! QUIET (trespassed = false)
//!   ↓ (hits/sec above threshold for more than required_consecutive_seconds,
//!      grace period open)
//! ALARMED (trespassed = true)
//!   ↓ (a sub-threshold second with no trespass in the preceding second)
//! QUIET
//! ```
//!
//! Escalation counts at most one trespass per distinct second and requires
//! strictly more than `required_consecutive_seconds` of them, so brief
//! excursions never alarm. De-escalation needs the rate back below the
//! threshold with no trespass recorded in the immediately preceding second,
//! so the flag does not flap on a single quiet instant.
//!
//! The escalation dedupe compares `last_trespass_second != when` while the
//! de-escalation look-back compares `last_trespass_second < when - 1`. The
//! asymmetry is long-standing behavior this module preserves: a suppressed
//! re-trespass can keep an earlier alarm alive, or let it clear, depending on
//! exact second alignment. Tests covering those corners document current
//! behavior rather than a contract.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

/// Minimum seconds between two alarm emissions from the same detector.
pub const ALERT_GRACE_PERIOD_SECS: i64 = 60;

/// Export key used when the caller supplies an empty one.
const DEFAULT_EXPORT_KEY: &str = "alert_counter";

/// Sustained-rate trespass detector for one monitored entity.
///
/// Feed it every hit via [`inc_hits`](Self::inc_hits); it keeps the
/// per-second count itself. All timestamps are caller-supplied unix seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrespassDetector {
    /// Hit count above which a second is a trespass
    max_hits_per_sec: u32,
    /// Consecutive trespass seconds required before the alarm may raise,
    /// clamped to at least 1
    required_consecutive_seconds: u8,
    /// Hits seen in the second currently being filled
    hits_this_second: u32,
    /// Hits seen since the run state was last initialized
    hits_since_first_alert: u32,
    /// Unix second of the most recent hit
    last_hit: i64,
    /// Length of the current consecutive trespass run
    consecutive_trespass_count: u32,
    /// Most recent second recorded as a trespass
    last_trespass_second: i64,
    /// Second of the most recent alarm emission
    last_alert_time: i64,
    /// Per-second hit count at the moment of the most recent alarm
    last_alert_hit_count: u32,
    /// Current alarm flag
    trespassed: bool,
}

impl TrespassDetector {
    /// Create a detector with the given thresholds.
    ///
    /// A `required_consecutive_seconds` of 0 is clamped to 1. A
    /// `max_hits_per_sec` of 0 is legal and makes any hit in a second a
    /// trespass.
    pub fn new(max_hits_per_sec: u32, required_consecutive_seconds: u8) -> Self {
        Self {
            max_hits_per_sec,
            required_consecutive_seconds: required_consecutive_seconds.max(1),
            hits_this_second: 0,
            hits_since_first_alert: 0,
            last_hit: 0,
            consecutive_trespass_count: 0,
            last_trespass_second: 0,
            last_alert_time: 0,
            last_alert_hit_count: 0,
            trespassed: false,
        }
    }

    /// Replace the thresholds and restart the detector.
    ///
    /// Re-applies the duration clamp and reinitializes the run state, so the
    /// next hit starts a fresh consecutive run with the alarm cleared.
    pub fn reset_thresholds(&mut self, max_hits_per_sec: u32, required_consecutive_seconds: u8) {
        self.max_hits_per_sec = max_hits_per_sec;
        self.required_consecutive_seconds = required_consecutive_seconds.max(1);
        self.init();

        debug!(
            max_hits_per_sec = self.max_hits_per_sec,
            required_consecutive_seconds = self.required_consecutive_seconds,
            "Detector thresholds reset"
        );
    }

    /// Zero the run state and clear the alarm. Thresholds survive.
    fn init(&mut self) {
        self.hits_this_second = 0;
        self.hits_since_first_alert = 0;
        self.last_hit = 0;
        self.consecutive_trespass_count = 0;
        self.last_trespass_second = 0;
        self.last_alert_time = 0;
        self.last_alert_hit_count = 0;
        self.trespassed = false;
    }

    /// Feed one hit at unix second `when` and return the alarm flag.
    ///
    /// # Algorithm
    ///
    /// 1. Two or more silent seconds reinitialize the run; moving to the
    ///    adjacent next second restarts only the per-second count.
    /// 2. The hit lands in the per-second and cumulative counters.
    /// 3. The first over-threshold hit of a second extends the consecutive
    ///    run.
    /// 4. Once the run is strictly longer than the required duration and the
    ///    grace period has elapsed, the alarm raises and the call returns
    ///    immediately.
    /// 5. Otherwise a sub-threshold second with no trespass in the preceding
    ///    second clears the alarm.
    ///
    /// # Returns
    ///
    /// The alarm flag after this hit. `true` is returned both on the call
    /// that raises the alarm and on every later call while it stays latched.
    pub fn inc_hits(&mut self, when: i64) -> bool {
        if self.last_hit < when - 1 {
            // Run broken: a gap of two or more silent seconds starts over
            debug!(
                when = when,
                last_hit = self.last_hit,
                "Gap in hit stream, reinitializing trespass run"
            );
            self.init();
        } else if self.last_hit == when - 1 {
            self.hits_this_second = 0;
        }

        self.hits_this_second = self.hits_this_second.saturating_add(1);
        self.hits_since_first_alert = self.hits_since_first_alert.saturating_add(1);
        self.last_hit = when;

        if self.hits_this_second > self.max_hits_per_sec && self.last_trespass_second != when {
            // First over-threshold hit of this second
            self.consecutive_trespass_count = self.consecutive_trespass_count.saturating_add(1);
            self.last_trespass_second = when;

            trace!(
                when = when,
                consecutive = self.consecutive_trespass_count,
                required = self.required_consecutive_seconds,
                hits = self.hits_this_second,
                "Trespass second recorded"
            );

            if self.consecutive_trespass_count > u32::from(self.required_consecutive_seconds)
                && when > self.last_alert_time + ALERT_GRACE_PERIOD_SECS
            {
                self.last_alert_time = when;
                self.last_alert_hit_count = self.hits_this_second;
                self.trespassed = true;

                warn!(
                    when = when,
                    hits = self.hits_this_second,
                    threshold = self.max_hits_per_sec,
                    consecutive = self.consecutive_trespass_count,
                    total_hits = self.hits_since_first_alert,
                    "Sustained rate trespass, alarm raised"
                );
                #[cfg(feature = "metrics")]
                metrics::counter!("alert_engine.alerts_emitted").increment(1);

                // The de-escalation check does not run on the call that
                // raises the alarm
                return self.trespassed;
            }
        }

        if self.hits_this_second < self.max_hits_per_sec && self.last_trespass_second < when - 1 {
            if self.trespassed {
                debug!(when = when, "Trespass alarm cleared");
            }
            self.trespassed = false;
        }

        self.trespassed
    }

    /// Alarm flag as of the last [`inc_hits`](Self::inc_hits) call.
    pub fn is_trespassed(&self) -> bool {
        self.trespassed
    }

    /// Point-in-time copy of the detector state.
    pub fn snapshot(&self) -> TrespassSnapshot {
        TrespassSnapshot {
            max_hits_per_sec: self.max_hits_per_sec,
            hits_since_first_alert: self.hits_since_first_alert,
            required_consecutive_seconds: self.required_consecutive_seconds,
            last_hit: self.last_hit,
            last_alert_time: self.last_alert_time,
            last_trespass_second: self.last_trespass_second,
            consecutive_trespass_count: self.consecutive_trespass_count,
            hits_this_second: self.hits_this_second,
            last_alert_hit_count: self.last_alert_hit_count,
            trespassed: self.trespassed,
        }
    }

    /// Render the detector state as a JSON object under `key`.
    ///
    /// An empty `key` falls back to `"alert_counter"`. Consumers rely on the
    /// field order of [`TrespassSnapshot`]; how the value travels past this
    /// point is their concern.
    ///
    /// # Errors
    ///
    /// Returns an error if the state fails to serialize.
    pub fn export_state(&self, key: &str) -> Result<Value> {
        let table_key = if key.is_empty() { DEFAULT_EXPORT_KEY } else { key };

        let fields = serde_json::to_value(self.snapshot())
            .context("Failed to serialize trespass detector state")?;

        let mut table = Map::new();
        table.insert(table_key.to_string(), fields);
        Ok(Value::Object(table))
    }
}

/// Point-in-time view of [`TrespassDetector`] state.
///
/// Field declaration order is the export order monitoring surfaces consume;
/// append new fields at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrespassSnapshot {
    /// Configured hit threshold
    pub max_hits_per_sec: u32,
    /// Hits seen since the run state was last initialized
    pub hits_since_first_alert: u32,
    /// Configured run length requirement
    pub required_consecutive_seconds: u8,
    /// Unix second of the most recent hit
    pub last_hit: i64,
    /// Second of the most recent alarm emission
    pub last_alert_time: i64,
    /// Most recent second recorded as a trespass
    pub last_trespass_second: i64,
    /// Length of the current consecutive trespass run
    pub consecutive_trespass_count: u32,
    /// Hits seen in the second currently being filled
    pub hits_this_second: u32,
    /// Per-second hit count at the moment of the most recent alarm
    pub last_alert_hit_count: u32,
    /// Current alarm flag
    pub trespassed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed `hits` hits at second `when`, returning the last alarm flag
    fn feed_hits(detector: &mut TrespassDetector, when: i64, hits: u32) -> bool {
        let mut alarmed = false;
        for _ in 0..hits {
            alarmed = detector.inc_hits(when);
        }
        alarmed
    }

    // ========================================================================
    // Construction and threshold tests
    // ========================================================================

    #[test]
    fn test_new_detector_starts_quiet() {
        let detector = TrespassDetector::new(10, 5);

        assert!(!detector.is_trespassed());
        let snapshot = detector.snapshot();
        assert_eq!(snapshot.max_hits_per_sec, 10);
        assert_eq!(snapshot.required_consecutive_seconds, 5);
        assert_eq!(snapshot.hits_since_first_alert, 0);
        assert_eq!(snapshot.last_hit, 0);
    }

    #[test]
    fn test_zero_duration_clamped_to_one() {
        let detector = TrespassDetector::new(10, 0);

        assert_eq!(detector.snapshot().required_consecutive_seconds, 1);
    }

    #[test]
    fn test_reset_thresholds_restarts_run() {
        let mut detector = TrespassDetector::new(10, 1);
        feed_hits(&mut detector, 100, 11);
        assert!(feed_hits(&mut detector, 101, 11));

        detector.reset_thresholds(20, 0);

        let snapshot = detector.snapshot();
        assert_eq!(snapshot.max_hits_per_sec, 20);
        assert_eq!(snapshot.required_consecutive_seconds, 1); // re-clamped
        assert_eq!(snapshot.hits_this_second, 0);
        assert_eq!(snapshot.hits_since_first_alert, 0);
        assert_eq!(snapshot.consecutive_trespass_count, 0);
        assert_eq!(snapshot.last_alert_time, 0);
        assert!(!snapshot.trespassed);
    }

    // ========================================================================
    // Escalation tests
    // ========================================================================

    #[test]
    fn test_escalation_requires_strictly_more_consecutive_seconds() {
        let mut detector = TrespassDetector::new(5, 2);

        assert!(!feed_hits(&mut detector, 100, 6));
        assert!(!feed_hits(&mut detector, 101, 6)); // run == required, not yet
        assert!(feed_hits(&mut detector, 102, 6)); // run exceeds required

        assert_eq!(detector.snapshot().last_alert_time, 102);
        assert_eq!(detector.snapshot().last_alert_hit_count, 6);
    }

    #[test]
    fn test_trespass_counted_once_per_second() {
        let mut detector = TrespassDetector::new(0, 5);

        feed_hits(&mut detector, 100, 100);

        let snapshot = detector.snapshot();
        assert_eq!(snapshot.consecutive_trespass_count, 1);
        assert_eq!(snapshot.hits_this_second, 100);
        assert_eq!(snapshot.last_trespass_second, 100);
    }

    #[test]
    fn test_at_threshold_seconds_never_escalate() {
        let mut detector = TrespassDetector::new(10, 1);

        // Exactly the threshold is not over it
        for when in 100..110 {
            assert!(!feed_hits(&mut detector, when, 10));
        }

        assert_eq!(detector.snapshot().consecutive_trespass_count, 0);
    }

    #[test]
    fn test_alarm_gate_measures_grace_from_zeroed_state() {
        let mut detector = TrespassDetector::new(0, 1);

        // A fresh detector holds last_alert_time at 0, so a run living
        // entirely inside the first grace window stays silent
        for when in 1..=ALERT_GRACE_PERIOD_SECS {
            assert!(!detector.inc_hits(when));
        }

        assert!(detector.inc_hits(ALERT_GRACE_PERIOD_SECS + 1));
    }

    // ========================================================================
    // Grace period tests
    // ========================================================================

    #[test]
    fn test_grace_period_suppresses_reemission() {
        let mut detector = TrespassDetector::new(10, 1);
        feed_hits(&mut detector, 100, 11);
        assert!(feed_hits(&mut detector, 101, 11));

        // Still over threshold the next second: latched, but no new emission
        assert!(feed_hits(&mut detector, 102, 11));

        let snapshot = detector.snapshot();
        assert_eq!(snapshot.last_alert_time, 101);
        assert_eq!(snapshot.last_alert_hit_count, 11);
        assert_eq!(snapshot.consecutive_trespass_count, 3);
    }

    #[test]
    fn test_grace_period_reopens_for_sustained_offender() {
        let mut detector = TrespassDetector::new(0, 1);

        let mut first_alarm = 0;
        for when in 100..=300 {
            detector.inc_hits(when);
            if first_alarm == 0 && detector.snapshot().last_alert_time != 0 {
                first_alarm = detector.snapshot().last_alert_time;
            }
        }

        assert_eq!(first_alarm, 101);
        // One re-emission per grace window while the pressure holds:
        // 101, then 162, 223, 284
        assert_eq!(detector.snapshot().last_alert_time, 284);
    }

    // ========================================================================
    // De-escalation tests
    // ========================================================================

    #[test]
    fn test_alarm_survives_first_quiet_second() {
        let mut detector = TrespassDetector::new(10, 1);
        feed_hits(&mut detector, 100, 11);
        feed_hits(&mut detector, 101, 12);
        assert!(feed_hits(&mut detector, 102, 13));

        // The look-back still sees the trespass at t=102, so one quiet
        // second does not clear the alarm
        assert!(feed_hits(&mut detector, 103, 1));
        // The second quiet second does
        assert!(!feed_hits(&mut detector, 104, 1));
    }

    #[test]
    fn test_suppressed_retrespasses_keep_alarm_latched() {
        let mut detector = TrespassDetector::new(10, 1);
        feed_hits(&mut detector, 100, 11);
        assert!(feed_hits(&mut detector, 101, 11));

        // Every later second still records a (grace-suppressed) trespass,
        // which keeps the de-escalation look-back blocked
        for when in 102..110 {
            assert!(feed_hits(&mut detector, when, 11));
        }

        assert!(detector.is_trespassed());
        assert_eq!(detector.snapshot().last_alert_time, 101);
    }

    #[test]
    fn test_at_threshold_seconds_clear_like_quiet_ones() {
        let mut detector = TrespassDetector::new(10, 1);
        feed_hits(&mut detector, 100, 11);
        assert!(feed_hits(&mut detector, 101, 11));

        // At-threshold seconds record no trespass. The clear condition sees
        // the per-second count while it is still accumulating, so once the
        // look-back goes stale the early hits of the second clear the flag.
        assert!(feed_hits(&mut detector, 102, 10));
        assert!(!feed_hits(&mut detector, 103, 10));
    }

    #[test]
    fn test_zero_threshold_alarm_latches_until_gap() {
        let mut detector = TrespassDetector::new(0, 1);
        detector.inc_hits(100);
        assert!(detector.inc_hits(101));

        // With a zero threshold no second can read below it
        for when in 102..110 {
            assert!(detector.inc_hits(when));
        }

        // Only a gap clears the alarm
        assert!(!detector.inc_hits(120));
    }

    // ========================================================================
    // Gap handling tests
    // ========================================================================

    #[test]
    fn test_gap_reinitializes_run_and_clears_alarm() {
        let mut detector = TrespassDetector::new(10, 1);
        feed_hits(&mut detector, 100, 11);
        assert!(feed_hits(&mut detector, 101, 11));

        assert!(!detector.inc_hits(110));

        let snapshot = detector.snapshot();
        assert_eq!(snapshot.hits_this_second, 1);
        assert_eq!(snapshot.hits_since_first_alert, 1);
        assert_eq!(snapshot.consecutive_trespass_count, 0);
        assert_eq!(snapshot.last_trespass_second, 0);
        assert_eq!(snapshot.last_alert_time, 0);
        assert_eq!(snapshot.last_hit, 110);
        assert!(!snapshot.trespassed);
    }

    #[test]
    fn test_adjacent_second_resets_per_second_count_only() {
        let mut detector = TrespassDetector::new(10, 1);
        feed_hits(&mut detector, 100, 11);

        detector.inc_hits(101);

        let snapshot = detector.snapshot();
        assert_eq!(snapshot.hits_this_second, 1);
        assert_eq!(snapshot.hits_since_first_alert, 12); // cumulative survives
        assert_eq!(snapshot.consecutive_trespass_count, 1);
    }

    // ========================================================================
    // Snapshot and export tests
    // ========================================================================

    #[test]
    fn test_snapshot_reflects_full_state() {
        let mut detector = TrespassDetector::new(10, 1);
        feed_hits(&mut detector, 100, 11);
        feed_hits(&mut detector, 101, 12);
        feed_hits(&mut detector, 102, 13);

        let snapshot = detector.snapshot();
        assert_eq!(snapshot.max_hits_per_sec, 10);
        assert_eq!(snapshot.required_consecutive_seconds, 1);
        assert_eq!(snapshot.hits_this_second, 13);
        assert_eq!(snapshot.hits_since_first_alert, 36);
        assert_eq!(snapshot.last_hit, 102);
        assert_eq!(snapshot.last_alert_time, 101);
        assert_eq!(snapshot.last_trespass_second, 102);
        assert_eq!(snapshot.consecutive_trespass_count, 3);
        assert_eq!(snapshot.last_alert_hit_count, 11);
        assert!(snapshot.trespassed);
    }

    #[test]
    fn test_snapshot_serializes_in_declaration_order() {
        let detector = TrespassDetector::new(10, 5);

        let json = serde_json::to_string(&detector.snapshot()).unwrap();

        assert_eq!(
            json,
            "{\"max_hits_per_sec\":10,\
             \"hits_since_first_alert\":0,\
             \"required_consecutive_seconds\":5,\
             \"last_hit\":0,\
             \"last_alert_time\":0,\
             \"last_trespass_second\":0,\
             \"consecutive_trespass_count\":0,\
             \"hits_this_second\":0,\
             \"last_alert_hit_count\":0,\
             \"trespassed\":false}"
        );
    }

    #[test]
    fn test_snapshot_serialization_round_trip() {
        let mut detector = TrespassDetector::new(10, 1);
        feed_hits(&mut detector, 100, 11);
        feed_hits(&mut detector, 101, 11);

        let snapshot = detector.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let deserialized: TrespassSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized, snapshot);
        assert!(deserialized.trespassed);
        assert_eq!(deserialized.last_alert_time, 101);
    }

    #[test]
    fn test_export_state_wraps_fields_under_key() {
        let mut detector = TrespassDetector::new(10, 1);
        feed_hits(&mut detector, 100, 11);

        let exported = detector.export_state("edge-router-7").unwrap();

        let fields = exported.get("edge-router-7").unwrap();
        assert_eq!(fields.get("max_hits_per_sec").unwrap(), 10);
        assert_eq!(fields.get("hits_this_second").unwrap(), 11);
        assert_eq!(fields.get("trespassed").unwrap(), false);
    }

    #[test]
    fn test_export_state_empty_key_falls_back() {
        let detector = TrespassDetector::new(10, 5);

        let exported = detector.export_state("").unwrap();

        assert!(exported.get("alert_counter").is_some());
    }

    #[test]
    fn test_export_state_preserves_field_order() {
        let detector = TrespassDetector::new(10, 5);

        let exported = detector.export_state("counter").unwrap();
        let json = serde_json::to_string(exported.get("counter").unwrap()).unwrap();

        assert!(json.starts_with("{\"max_hits_per_sec\""));
        assert!(json.ends_with("\"trespassed\":false}"));
    }
}
