//! Broadcast loop configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::protocol::HAND_POSITION_EVENT;

/// Default tick period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How many pending batches a single tick publishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DrainMode {
    /// At most one batch per tick
    #[default]
    OnePerTick,
    /// Everything pending, in order
    All,
}

impl DrainMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrainMode::OnePerTick => "one",
            DrainMode::All => "all",
        }
    }
}

impl fmt::Display for DrainMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DrainMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "one" | "one-per-tick" | "single" => Ok(DrainMode::OnePerTick),
            "all" => Ok(DrainMode::All),
            other => Err(format!(
                "unknown drain mode '{other}' (expected 'one' or 'all')"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    pub poll_interval: Duration,
    pub drain_mode: DrainMode,
    /// Event name batches are published under
    pub event_name: String,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            drain_mode: DrainMode::default(),
            event_name: HAND_POSITION_EVENT.to_string(),
        }
    }
}

impl BroadcastConfig {
    /// Set the tick period (zero is raised to 1ms)
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn drain_mode(mut self, mode: DrainMode) -> Self {
        self.drain_mode = mode;
        self
    }

    pub fn event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BroadcastConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(20));
        assert_eq!(config.drain_mode, DrainMode::OnePerTick);
        assert_eq!(config.event_name, "handPosition");
    }

    #[test]
    fn test_zero_interval_raised() {
        let config = BroadcastConfig::default().poll_interval(Duration::ZERO);
        assert_eq!(config.poll_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_drain_mode_parse() {
        assert_eq!("one".parse::<DrainMode>(), Ok(DrainMode::OnePerTick));
        assert_eq!("One_Per_Tick".parse::<DrainMode>(), Ok(DrainMode::OnePerTick));
        assert_eq!(" ALL ".parse::<DrainMode>(), Ok(DrainMode::All));
        assert!("some".parse::<DrainMode>().is_err());

        for mode in [DrainMode::OnePerTick, DrainMode::All] {
            assert_eq!(mode.to_string().parse::<DrainMode>(), Ok(mode));
        }
    }
}
