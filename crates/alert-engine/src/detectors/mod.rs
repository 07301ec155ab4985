//! Stateful hit-stream detectors
//!
//! This module provides the two detectors fed from a per-entity hit stream:
//! - Trailing window: conservative sustained-rate estimate
//! - Trespass: debounced alarm on sustained over-threshold pressure
//!
//! Both consume caller-supplied unix-second timestamps and treat any gap of
//! more than one second as the end of the current run.

pub mod trailing_window;
pub mod trespass;

pub use trailing_window::{TrailingWindowCounter, TRAILING_WINDOW_SECS};
pub use trespass::{TrespassDetector, TrespassSnapshot, ALERT_GRACE_PERIOD_SECS};
