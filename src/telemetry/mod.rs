//! Telemetry module for logging and metrics.
//!
//! Provides:
//! - Logging configuration and initialization
//! - Counters for link statistics

mod logging;
mod metrics;

pub use logging::{init_logging, LogConfig, LOG_FORMATS, LOG_LEVELS};
pub use metrics::{Counter, LinkStats, LinkStatsSnapshot};
