//! Meter identities and instrument handles.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gqlmetrics_proto::{CounterStats, TimerStats};

use super::histogram::Histogram;

/// Identity of a meter: a metric name plus its tag set.
///
/// The description is carried along for export but is not part of the
/// identity, so two ids differing only in description address the same meter.
#[derive(Debug, Clone)]
pub struct MeterId {
    name: String,
    tags: BTreeMap<String, String>,
    description: Option<String>,
}

impl MeterId {
    /// Create an id with no tags.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: BTreeMap::new(),
            description: None,
        }
    }

    /// Add a tag, replacing any previous value for the key.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag set, sorted by key.
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Get a tag value.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Description, if one was given.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl PartialEq for MeterId {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.tags == other.tags
    }
}

impl Eq for MeterId {}

impl Hash for MeterId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.tags.hash(state);
    }
}

/// Handle to a registered timer.
///
/// Clones share the same underlying samples.
#[derive(Clone, Default)]
pub struct Timer {
    histogram: Arc<Histogram>,
}

impl Timer {
    /// Create a standalone timer with the default latency buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a duration.
    pub fn record(&self, duration: Duration) {
        self.record_nanos(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX));
    }

    /// Record a duration given in nanoseconds.
    pub fn record_nanos(&self, nanos: u64) {
        self.histogram.observe(nanos);
    }

    /// Number of recorded samples.
    pub fn count(&self) -> u64 {
        self.histogram.count()
    }

    /// Sum of all samples.
    pub fn total_time(&self) -> Duration {
        Duration::from_nanos(self.histogram.sum())
    }

    /// Largest sample.
    pub fn max(&self) -> Duration {
        Duration::from_nanos(self.histogram.max())
    }

    /// Mean sample.
    pub fn mean(&self) -> Duration {
        Duration::from_nanos(self.histogram.mean())
    }

    /// Approximate percentile as a bucket upper bound.
    pub fn percentile(&self, p: f64) -> Duration {
        Duration::from_nanos(self.histogram.percentile(p))
    }

    /// Current statistics.
    pub fn stats(&self) -> TimerStats {
        TimerStats {
            count: self.histogram.count(),
            total_nanos: self.histogram.sum(),
            max_nanos: self.histogram.max(),
            mean_nanos: self.histogram.mean(),
            p50_nanos: self.histogram.p50(),
            p99_nanos: self.histogram.p99(),
        }
    }

    pub(crate) fn reset(&self) {
        self.histogram.reset();
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("count", &self.count())
            .field("total_time", &self.total_time())
            .finish()
    }
}

/// Handle to a registered counter.
///
/// Clones share the same underlying count.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    count: Arc<AtomicU64>,
}

impl Counter {
    /// Create a standalone counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by one.
    pub fn increment(&self) {
        self.increment_by(1);
    }

    /// Increment by `amount`.
    pub fn increment_by(&self, amount: u64) {
        self.count.fetch_add(amount, Ordering::Relaxed);
    }

    /// Current count.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Current statistics.
    pub fn stats(&self) -> CounterStats {
        CounterStats { count: self.count() }
    }

    pub(crate) fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
    }
}
