//! Metrics collection infrastructure.
//!
//! This module provides the meter registry that instrumentation records into:
//! tagged timers backed by a latency histogram, monotonic counters, and
//! Prometheus text export.
//!
//! # Usage
//!
//! ```ignore
//! use std::time::Duration;
//! use gqlmetrics_core::metrics::{new_shared_registry, MeterId, MeterRegistry};
//!
//! let registry = new_shared_registry();
//!
//! let id = MeterId::new("graphql.timer.query")
//!     .tag("operationName", "GetUser")
//!     .tag("operation", "execution");
//! registry.timer(&id)?.record(Duration::from_millis(5));
//!
//! let prometheus_text = registry.to_prometheus();
//! ```

mod histogram;
mod meter;
mod registry;

pub use histogram::Histogram;
pub use meter::{Counter, MeterId, Timer};
pub use registry::{new_shared_registry, MeterRegistry, MetricsRegistry, SharedMetricsRegistry};
