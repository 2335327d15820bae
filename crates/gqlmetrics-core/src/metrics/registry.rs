//! Meter registry.
//!
//! `MeterRegistry` is the seam between instrumentation and whatever backend
//! aggregates the samples. `MetricsRegistry` is the in-process implementation:
//! it keeps every meter in memory and renders them as Prometheus text or
//! snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gqlmetrics_proto::{MeterKind, MeterSnapshot, MeterStats};
use tracing::debug;

use super::meter::{Counter, MeterId, Timer};
use crate::error::{Error, Result};

/// A registry that hands out timers and counters by identity.
///
/// Registration must be idempotent: asking twice for the same name and tag set
/// returns handles to the same instrument. A name keeps the kind it was first
/// registered with.
pub trait MeterRegistry: Send + Sync {
    /// Get or register a timer.
    fn timer(&self, id: &MeterId) -> Result<Timer>;

    /// Get or register a counter.
    fn counter(&self, id: &MeterId) -> Result<Counter>;
}

/// A registered instrument.
#[derive(Debug, Clone)]
enum Meter {
    Timer(Timer),
    Counter(Counter),
}

impl Meter {
    fn kind(&self) -> MeterKind {
        match self {
            Meter::Timer(_) => MeterKind::Timer,
            Meter::Counter(_) => MeterKind::Counter,
        }
    }

    fn stats(&self) -> MeterStats {
        match self {
            Meter::Timer(timer) => MeterStats::Timer(timer.stats()),
            Meter::Counter(counter) => MeterStats::Counter(counter.stats()),
        }
    }
}

/// In-memory registry for all meters.
pub struct MetricsRegistry {
    /// Registry creation time.
    started_at: Instant,
    meters: DashMap<MeterId, Meter>,
    /// Kind bound to each metric name, across all tag sets.
    kinds: DashMap<String, MeterKind>,
}

impl MetricsRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            meters: DashMap::new(),
            kinds: DashMap::new(),
        }
    }

    fn register<T>(
        &self,
        id: &MeterId,
        requested: MeterKind,
        create: impl FnOnce() -> (Meter, T),
        extract: impl Fn(&Meter) -> Option<T>,
    ) -> Result<T> {
        if id.name().trim().is_empty() {
            return Err(Error::InvalidMeterName(id.name().to_string()));
        }

        let conflict = |existing: MeterKind| Error::MeterKindConflict {
            name: id.name().to_string(),
            existing,
            requested,
        };

        // Fast path without cloning the id
        if let Some(meter) = self.meters.get(id) {
            return extract(meter.value()).ok_or_else(|| conflict(meter.kind()));
        }

        let bound = self.kinds.get(id.name()).map(|kind| *kind);
        let bound = match bound {
            Some(kind) => kind,
            None => *self.kinds.entry(id.name().to_string()).or_insert(requested),
        };
        if bound != requested {
            return Err(conflict(bound));
        }

        match self.meters.entry(id.clone()) {
            Entry::Occupied(entry) => {
                extract(entry.get()).ok_or_else(|| conflict(entry.get().kind()))
            }
            Entry::Vacant(entry) => {
                let (meter, handle) = create();
                entry.insert(meter);
                debug!(
                    name = id.name(),
                    kind = %requested,
                    tags = id.tags().len(),
                    "Registered meter"
                );
                Ok(handle)
            }
        }
    }

    /// Find a registered timer by name and tags.
    pub fn find_timer(&self, name: &str, tags: &[(&str, &str)]) -> Option<Timer> {
        match self.meters.get(&lookup_id(name, tags))?.value() {
            Meter::Timer(timer) => Some(timer.clone()),
            Meter::Counter(_) => None,
        }
    }

    /// Find a registered counter by name and tags.
    pub fn find_counter(&self, name: &str, tags: &[(&str, &str)]) -> Option<Counter> {
        match self.meters.get(&lookup_id(name, tags))?.value() {
            Meter::Counter(counter) => Some(counter.clone()),
            Meter::Timer(_) => None,
        }
    }

    /// Number of registered meters.
    pub fn len(&self) -> usize {
        self.meters.len()
    }

    /// Check if no meters are registered.
    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }

    /// Get uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Snapshot of every meter, sorted by name then tags.
    pub fn snapshot(&self) -> Vec<MeterSnapshot> {
        let mut snapshots: Vec<MeterSnapshot> = self
            .meters
            .iter()
            .map(|entry| MeterSnapshot {
                name: entry.key().name().to_string(),
                description: entry.key().description().map(str::to_string),
                tags: entry.key().tags().clone(),
                stats: entry.value().stats(),
            })
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.tags.cmp(&b.tags)));
        snapshots
    }

    /// Snapshot of every meter with the given name.
    pub fn snapshot_named(&self, name: &str) -> Vec<MeterSnapshot> {
        self.snapshot()
            .into_iter()
            .filter(|snapshot| snapshot.name == name)
            .collect()
    }

    /// Export to Prometheus text format.
    ///
    /// Dots in metric names become underscores. Timers are exported in
    /// seconds as a summary (`_count`, `_sum`) plus a `_max` gauge; counters
    /// get a `_total` suffix.
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP gqlmetrics_uptime_seconds Registry uptime in seconds\n");
        out.push_str("# TYPE gqlmetrics_uptime_seconds gauge\n");
        out.push_str(&format!("gqlmetrics_uptime_seconds {}\n", self.uptime_secs()));

        let mut by_name: BTreeMap<String, Vec<MeterSnapshot>> = BTreeMap::new();
        for snapshot in self.snapshot() {
            by_name.entry(snapshot.name.clone()).or_default().push(snapshot);
        }

        for (name, snapshots) in &by_name {
            let base = sanitize_metric_name(name);
            let help = escape_help(
                snapshots
                    .iter()
                    .find_map(|s| s.description.as_deref())
                    .unwrap_or(name.as_str()),
            );

            match snapshots[0].kind() {
                MeterKind::Timer => {
                    out.push('\n');
                    out.push_str(&format!("# HELP {}_seconds {}\n", base, help));
                    out.push_str(&format!("# TYPE {}_seconds summary\n", base));
                    for snapshot in snapshots {
                        if let MeterStats::Timer(stats) = &snapshot.stats {
                            let labels = format_labels(&snapshot.tags);
                            out.push_str(&format!(
                                "{}_seconds_count{} {}\n",
                                base, labels, stats.count
                            ));
                            out.push_str(&format!(
                                "{}_seconds_sum{} {}\n",
                                base,
                                labels,
                                nanos_to_seconds(stats.total_nanos)
                            ));
                        }
                    }

                    out.push('\n');
                    out.push_str(&format!("# HELP {}_seconds_max {}\n", base, help));
                    out.push_str(&format!("# TYPE {}_seconds_max gauge\n", base));
                    for snapshot in snapshots {
                        if let MeterStats::Timer(stats) = &snapshot.stats {
                            out.push_str(&format!(
                                "{}_seconds_max{} {}\n",
                                base,
                                format_labels(&snapshot.tags),
                                nanos_to_seconds(stats.max_nanos)
                            ));
                        }
                    }
                }
                MeterKind::Counter => {
                    out.push('\n');
                    out.push_str(&format!("# HELP {}_total {}\n", base, help));
                    out.push_str(&format!("# TYPE {}_total counter\n", base));
                    for snapshot in snapshots {
                        if let MeterStats::Counter(stats) = &snapshot.stats {
                            out.push_str(&format!(
                                "{}_total{} {}\n",
                                base,
                                format_labels(&snapshot.tags),
                                stats.count
                            ));
                        }
                    }
                }
            }
        }

        out
    }

    /// Zero every meter without unregistering it (for testing).
    pub fn reset(&self) {
        for entry in self.meters.iter() {
            match entry.value() {
                Meter::Timer(timer) => timer.reset(),
                Meter::Counter(counter) => counter.reset(),
            }
        }
    }

    /// Unregister every meter and release their names.
    pub fn clear(&self) {
        self.meters.clear();
        self.kinds.clear();
    }
}

impl MeterRegistry for MetricsRegistry {
    fn timer(&self, id: &MeterId) -> Result<Timer> {
        self.register(
            id,
            MeterKind::Timer,
            || {
                let timer = Timer::new();
                (Meter::Timer(timer.clone()), timer)
            },
            |meter| match meter {
                Meter::Timer(timer) => Some(timer.clone()),
                Meter::Counter(_) => None,
            },
        )
    }

    fn counter(&self, id: &MeterId) -> Result<Counter> {
        self.register(
            id,
            MeterKind::Counter,
            || {
                let counter = Counter::new();
                (Meter::Counter(counter.clone()), counter)
            },
            |meter| match meter {
                Meter::Counter(counter) => Some(counter.clone()),
                Meter::Timer(_) => None,
            },
        )
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics registry handle.
pub type SharedMetricsRegistry = Arc<MetricsRegistry>;

/// Create a new shared metrics registry.
pub fn new_shared_registry() -> SharedMetricsRegistry {
    Arc::new(MetricsRegistry::new())
}

fn lookup_id(name: &str, tags: &[(&str, &str)]) -> MeterId {
    tags.iter()
        .fold(MeterId::new(name), |id, (key, value)| id.tag(*key, *value))
}

fn sanitize_metric_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn format_labels(tags: &BTreeMap<String, String>) -> String {
    if tags.is_empty() {
        return String::new();
    }
    let labels: Vec<String> = tags
        .iter()
        .map(|(key, value)| format!("{}=\"{}\"", sanitize_metric_name(key), escape_label(value)))
        .collect();
    format!("{{{}}}", labels.join(","))
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_help(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\n', "\\n")
}

fn nanos_to_seconds(nanos: u64) -> f64 {
    nanos as f64 / 1_000_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn query_timer_id(operation: &str) -> MeterId {
        MeterId::new("graphql.timer.query")
            .tag("operationName", "GetUser")
            .tag("operation", operation)
    }

    #[test]
    fn test_registration_is_idempotent() {
        let registry = MetricsRegistry::new();

        let first = registry.timer(&query_timer_id("execution")).unwrap();
        let second = registry.timer(&query_timer_id("execution")).unwrap();
        first.record(Duration::from_millis(1));
        second.record(Duration::from_millis(2));

        assert_eq!(registry.len(), 1);
        assert_eq!(first.count(), 2);
        assert_eq!(second.total_time(), Duration::from_millis(3));
    }

    #[test]
    fn test_distinct_tags_register_distinct_meters() {
        let registry = MetricsRegistry::new();

        registry.timer(&query_timer_id("execution")).unwrap();
        registry.timer(&query_timer_id("parsing")).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry
            .find_timer(
                "graphql.timer.query",
                &[("operationName", "GetUser"), ("operation", "parsing")]
            )
            .is_some());
        assert!(registry
            .find_timer("graphql.timer.query", &[("operation", "parsing")])
            .is_none());
    }

    #[test]
    fn test_kind_conflict() {
        let registry = MetricsRegistry::new();
        let id = MeterId::new("graphql.counter.error").tag("path", "user");

        registry.counter(&id).unwrap().increment();
        let err = registry.timer(&id).unwrap_err();

        assert!(matches!(
            err,
            Error::MeterKindConflict {
                existing: MeterKind::Counter,
                requested: MeterKind::Timer,
                ..
            }
        ));
        assert!(registry.find_timer("graphql.counter.error", &[("path", "user")]).is_none());
        assert_eq!(
            registry
                .find_counter("graphql.counter.error", &[("path", "user")])
                .map(|c| c.count()),
            Some(1)
        );
    }

    #[test]
    fn test_name_keeps_its_kind_across_tags() {
        let registry = MetricsRegistry::new();
        registry
            .timer(&MeterId::new("x.y").tag("a", "1"))
            .unwrap()
            .record(Duration::from_millis(1));

        let err = registry
            .counter(&MeterId::new("x.y").tag("a", "2"))
            .unwrap_err();

        assert!(matches!(
            err,
            Error::MeterKindConflict {
                existing: MeterKind::Timer,
                requested: MeterKind::Counter,
                ..
            }
        ));
        assert_eq!(registry.len(), 1);
        assert!(registry.timer(&MeterId::new("x.y").tag("a", "2")).is_ok());

        let prometheus = registry.to_prometheus();
        assert!(prometheus.contains("x_y_seconds_count{a=\"1\"} 1"));
        assert!(prometheus.contains("x_y_seconds_count{a=\"2\"} 0"));
        assert!(!prometheus.contains("x_y_total"));

        registry.clear();
        assert!(registry.counter(&MeterId::new("x.y").tag("a", "2")).is_ok());
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let registry = MetricsRegistry::new();
        let err = registry.counter(&MeterId::new("  ")).unwrap_err();
        assert!(matches!(err, Error::InvalidMeterName(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let registry = MetricsRegistry::new();
        registry.timer(&query_timer_id("validation")).unwrap();
        registry
            .counter(&MeterId::new("graphql.counter.error").tag("code", "unknown"))
            .unwrap()
            .increment();
        registry.timer(&query_timer_id("execution")).unwrap();

        let snapshot = registry.snapshot();
        let order: Vec<_> = snapshot
            .iter()
            .map(|s| (s.name.as_str(), s.tag("operation").unwrap_or("-")))
            .collect();
        assert_eq!(
            order,
            vec![
                ("graphql.counter.error", "-"),
                ("graphql.timer.query", "execution"),
                ("graphql.timer.query", "validation"),
            ]
        );
        assert_eq!(snapshot[0].kind(), MeterKind::Counter);
        assert_eq!(registry.snapshot_named("graphql.timer.query").len(), 2);
    }

    #[test]
    fn test_prometheus_format() {
        let registry = MetricsRegistry::new();
        registry
            .timer(&query_timer_id("execution").with_description("Query time"))
            .unwrap()
            .record(Duration::from_millis(5));
        registry
            .counter(
                &MeterId::new("graphql.counter.error")
                    .tag("path", "say \"hi\"")
                    .tag("code", "NOT_FOUND"),
            )
            .unwrap()
            .increment_by(2);

        let prometheus = registry.to_prometheus();

        assert!(prometheus.contains("# HELP graphql_timer_query_seconds Query time"));
        assert!(prometheus.contains("# TYPE graphql_timer_query_seconds summary"));
        assert!(prometheus.contains(
            "graphql_timer_query_seconds_count{operation=\"execution\",operationName=\"GetUser\"} 1"
        ));
        assert!(prometheus.contains(
            "graphql_timer_query_seconds_sum{operation=\"execution\",operationName=\"GetUser\"} 0.005"
        ));
        assert!(prometheus.contains("# TYPE graphql_timer_query_seconds_max gauge"));
        assert!(prometheus.contains("# TYPE graphql_counter_error_total counter"));
        assert!(prometheus.contains(
            "graphql_counter_error_total{code=\"NOT_FOUND\",path=\"say \\\"hi\\\"\"} 2"
        ));
    }

    #[test]
    fn test_prometheus_help_is_escaped() {
        let registry = MetricsRegistry::new();
        registry
            .counter(&MeterId::new("errors").with_description("Errors\nby C:\\path"))
            .unwrap()
            .increment();

        let prometheus = registry.to_prometheus();

        assert!(prometheus.contains("# HELP errors_total Errors\\nby C:\\\\path\n"));
        assert!(prometheus.contains("errors_total 1\n"));
    }

    #[test]
    fn test_reset_and_clear() {
        let registry = MetricsRegistry::new();
        let timer = registry.timer(&query_timer_id("execution")).unwrap();
        timer.record(Duration::from_millis(1));

        registry.reset();
        assert_eq!(registry.len(), 1);
        assert_eq!(timer.count(), 0);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_shared_registry() {
        let registry = new_shared_registry();
        let id = MeterId::new("graphql.counter.error");

        registry.counter(&id).unwrap().increment();
        let registry2 = Arc::clone(&registry);
        registry2.counter(&id).unwrap().increment();

        assert_eq!(
            registry.find_counter("graphql.counter.error", &[]).map(|c| c.count()),
            Some(2)
        );
    }
}
