//! Per-entity rate-trespass detection core
//!
//! Feed timestamped hit events for one monitored entity and query derived
//! state: a conservative trailing-window rate estimate and a debounced
//! sustained-trespass alarm. Producing the event stream and delivering the
//! alerts stay with the embedding service; this crate only owns the
//! detection state machines.

pub mod clock;
pub mod detectors;
pub mod monitor;

// Re-export commonly used types
pub use clock::{Clock, SystemClock};
pub use detectors::trailing_window::{TrailingWindowCounter, TRAILING_WINDOW_SECS};
pub use detectors::trespass::{TrespassDetector, TrespassSnapshot, ALERT_GRACE_PERIOD_SECS};
pub use monitor::HitRateMonitor;
