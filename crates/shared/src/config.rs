//! Configuration management using environment variables
//!
//! Detection thresholds come from the environment with project defaults; a
//! `.env` file is honored when present. The thresholds are deliberately the
//! only tunables: window length and alert grace period are compile-time
//! constants owned by the detection crate.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::env;

/// Default hit count per second above which a second counts as a trespass.
pub const DEFAULT_MAX_HITS_PER_SEC: u32 = 10;

/// Default number of consecutive over-threshold seconds required before the
/// alarm may raise.
pub const DEFAULT_REQUIRED_CONSECUTIVE_SECS: u8 = 5;

/// Detection thresholds for one monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MonitorConfig {
    /// Hit count above which a second is a trespass. Zero is legal and means
    /// any hit in a second trespasses.
    pub max_hits_per_sec: u32,

    /// Consecutive trespass seconds required before the alarm may raise.
    /// Detectors clamp values below 1 at construction time.
    pub required_consecutive_secs: u8,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_hits_per_sec: DEFAULT_MAX_HITS_PER_SEC,
            required_consecutive_secs: DEFAULT_REQUIRED_CONSECUTIVE_SECS,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let max_hits_per_sec = env::var("RATE_MONITOR_MAX_HITS_PER_SEC")
            .unwrap_or_else(|_| DEFAULT_MAX_HITS_PER_SEC.to_string())
            .parse()
            .map_err(|e| Error::config(format!("Invalid RATE_MONITOR_MAX_HITS_PER_SEC: {}", e)))?;

        let required_consecutive_secs = env::var("RATE_MONITOR_REQUIRED_CONSECUTIVE_SECS")
            .unwrap_or_else(|_| DEFAULT_REQUIRED_CONSECUTIVE_SECS.to_string())
            .parse()
            .map_err(|e| {
                Error::config(format!("Invalid RATE_MONITOR_REQUIRED_CONSECUTIVE_SECS: {}", e))
            })?;

        if max_hits_per_sec == 0 {
            tracing::warn!(
                "RATE_MONITOR_MAX_HITS_PER_SEC is 0 - every hit will count as a trespass"
            );
        }

        Ok(Self {
            max_hits_per_sec,
            required_consecutive_secs,
        })
    }
}
