//! Meter snapshot types.
//!
//! These types describe the state of a registry at a point in time, suitable
//! for JSON export or assertions in tests.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a registered meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterKind {
    /// Records durations.
    Timer,
    /// Monotonic count.
    Counter,
}

impl fmt::Display for MeterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeterKind::Timer => f.write_str("timer"),
            MeterKind::Counter => f.write_str("counter"),
        }
    }
}

/// Point-in-time view of one meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterSnapshot {
    /// Metric name.
    pub name: String,
    /// Description given at registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tag set, sorted by key.
    pub tags: BTreeMap<String, String>,
    /// Recorded values.
    pub stats: MeterStats,
}

impl MeterSnapshot {
    /// Kind of the meter.
    pub fn kind(&self) -> MeterKind {
        match self.stats {
            MeterStats::Timer(_) => MeterKind::Timer,
            MeterStats::Counter(_) => MeterKind::Counter,
        }
    }

    /// Get a tag value.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Recorded values of a meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MeterStats {
    /// Timer statistics.
    Timer(TimerStats),
    /// Counter statistics.
    Counter(CounterStats),
}

/// Timer statistics. All durations are in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerStats {
    /// Number of recorded samples.
    pub count: u64,
    /// Sum of all samples.
    pub total_nanos: u64,
    /// Largest sample.
    pub max_nanos: u64,
    /// Mean sample.
    pub mean_nanos: u64,
    /// P50 (median) bucket boundary.
    pub p50_nanos: u64,
    /// P99 bucket boundary.
    pub p99_nanos: u64,
}

/// Counter statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterStats {
    /// Current count.
    pub count: u64,
}
