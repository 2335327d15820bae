//! Fixed-bucket histogram for timer samples.
//!
//! Values are nanoseconds. Resolver timings are routinely sub-microsecond
//! while whole operations can take seconds, so the buckets span both.

use std::sync::atomic::{AtomicU64, Ordering};

/// Default bucket boundaries in nanoseconds.
const LATENCY_BUCKETS_NS: [u64; 14] = [
    1_000,          // 1 microsecond
    10_000,         // 10 microseconds
    100_000,        // 100 microseconds
    500_000,        // 500 microseconds
    1_000_000,      // 1 millisecond
    5_000_000,      // 5 milliseconds
    10_000_000,     // 10 milliseconds
    50_000_000,     // 50 milliseconds
    100_000_000,    // 100 milliseconds
    500_000_000,    // 500 milliseconds
    1_000_000_000,  // 1 second
    5_000_000_000,  // 5 seconds
    10_000_000_000, // 10 seconds
    30_000_000_000, // 30 seconds
];

/// Fixed-bucket histogram.
///
/// All operations are lock-free using atomic operations.
pub struct Histogram {
    /// Bucket upper bounds in nanoseconds.
    buckets: Vec<u64>,
    /// Counts per bucket (each bucket counts values <= its bound and above the previous one).
    counts: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
    max: AtomicU64,
}

impl Histogram {
    /// Create a histogram with the default latency buckets (1us to 30s).
    pub fn latency() -> Self {
        Self::with_buckets(LATENCY_BUCKETS_NS.to_vec())
    }

    /// Create a histogram with custom bucket bounds.
    ///
    /// Bounds are sorted and deduplicated.
    pub fn with_buckets(mut buckets: Vec<u64>) -> Self {
        buckets.sort_unstable();
        buckets.dedup();
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            max: AtomicU64::new(0),
        }
    }

    /// Record a value in nanoseconds.
    pub fn observe(&self, value_ns: u64) {
        // Sum saturates at u64::MAX
        let _ = self
            .sum
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |sum| {
                Some(sum.saturating_add(value_ns))
            });
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(value_ns, Ordering::Relaxed);

        let index = self.buckets.partition_point(|&bound| bound < value_ns);
        // Values beyond the last bound land in the last bucket
        let index = index.min(self.counts.len().saturating_sub(1));
        if let Some(bucket) = self.counts.get(index) {
            bucket.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Total number of observations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Sum of all observed values.
    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    /// Largest observed value.
    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    /// Mean observed value.
    pub fn mean(&self) -> u64 {
        let count = self.count();
        if count == 0 {
            return 0;
        }
        self.sum() / count
    }

    /// Approximate percentile (e.g., 0.50 for P50, 0.99 for P99).
    ///
    /// Returns the upper bound of the bucket containing the target rank.
    pub fn percentile(&self, p: f64) -> u64 {
        let total = self.count();
        if total == 0 {
            return 0;
        }

        let target = ((total as f64 * p).ceil() as u64).max(1);
        let mut cumulative = 0u64;

        for (bound, count) in self.buckets.iter().zip(&self.counts) {
            cumulative += count.load(Ordering::Relaxed);
            if cumulative >= target {
                return *bound;
            }
        }

        *self.buckets.last().unwrap_or(&0)
    }

    /// P50 (median).
    pub fn p50(&self) -> u64 {
        self.percentile(0.50)
    }

    /// P99.
    pub fn p99(&self) -> u64 {
        self.percentile(0.99)
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.sum.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
        self.max.store(0, Ordering::Relaxed);
        for count in &self.counts {
            count.store(0, Ordering::Relaxed);
        }
    }

    /// Per-bucket `(upper_bound, count)` pairs.
    pub fn snapshot(&self) -> Vec<(u64, u64)> {
        self.buckets
            .iter()
            .zip(&self.counts)
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::latency()
    }
}
