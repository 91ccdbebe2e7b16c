//! Handoff capacity configuration

use std::fmt;
use std::str::FromStr;

/// Default number of pending batches before the overflow policy applies
///
/// At the default 20ms tick this is a little over a second of backlog.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// What the channel does when a push finds it full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Never full; memory and latency grow with the backlog
    Unbounded,
    /// Evict the oldest pending batch to make room
    #[default]
    DropOldest,
    /// Keep the queue as is and discard the incoming batch
    DropNewest,
}

impl OverflowPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverflowPolicy::Unbounded => "unbounded",
            OverflowPolicy::DropOldest => "drop-oldest",
            OverflowPolicy::DropNewest => "drop-newest",
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "unbounded" => Ok(OverflowPolicy::Unbounded),
            "drop-oldest" | "oldest" => Ok(OverflowPolicy::DropOldest),
            "drop-newest" | "newest" => Ok(OverflowPolicy::DropNewest),
            other => Err(format!(
                "unknown overflow policy '{other}' (expected unbounded, drop-oldest or drop-newest)"
            )),
        }
    }
}

/// Capacity and overflow behaviour of a `HandoffChannel`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoffConfig {
    /// Maximum pending batches (ignored for `Unbounded`, minimum 1)
    pub capacity: usize,

    /// Behaviour at capacity
    pub policy: OverflowPolicy,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            policy: OverflowPolicy::DropOldest,
        }
    }
}

impl HandoffConfig {
    /// Unbounded mailbox
    pub fn unbounded() -> Self {
        Self {
            capacity: 0,
            policy: OverflowPolicy::Unbounded,
        }
    }

    /// Bounded mailbox with the given policy
    pub fn bounded(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            capacity: capacity.max(1),
            policy,
        }
    }

    /// Effective limit, `None` when unbounded
    pub fn limit(&self) -> Option<usize> {
        match self.policy {
            OverflowPolicy::Unbounded => None,
            _ => Some(self.capacity.max(1)),
        }
    }
}
