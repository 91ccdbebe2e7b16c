//! Relay statistics

pub mod metrics;

pub use metrics::{log_summary, RelayStats, StatsSnapshot};
