//! Shared library for the rate-sentinel workspace
//!
//! This crate provides common functionality used by the detection crates and
//! their embedding services:
//! - Detection threshold configuration
//! - Error handling types
//! - Diagnostic data models
//! - Logging infrastructure

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{MonitorConfig, DEFAULT_MAX_HITS_PER_SEC, DEFAULT_REQUIRED_CONSECUTIVE_SECS};
pub use error::{Error, Result};
pub use models::MonitorTarget;

/// Initialize tracing subscriber for structured logging
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shared=debug,alert_engine=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
