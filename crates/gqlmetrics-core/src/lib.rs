//! gqlmetrics Core - meter registry and GraphQL execution instrumentation.
//!
//! An execution engine hands each completed result to an
//! [`ExecutionPipeline`]; the [`MetricsInstrumentation`] observer records
//! phase and resolver timings from the tracing report and counts errors.

pub mod config;
pub mod error;
pub mod instrumentation;
pub mod metrics;

pub use config::MetricsConfig;
pub use error::{Error, Result};
pub use instrumentation::{
    CallbackObserver, ExecutionObserver, ExecutionPipeline, MetricsInstrumentation,
    ERROR_COUNTER_METRIC_NAME, QUERY_TIME_METRIC_NAME, RESOLVER_TIME_METRIC_NAME,
    UNKNOWN_TAG_VALUE,
};

// Metrics exports
pub use metrics::{
    new_shared_registry, Counter, Histogram, MeterId, MeterRegistry, MetricsRegistry,
    SharedMetricsRegistry, Timer,
};

/// Re-export protocol types.
pub use gqlmetrics_proto as proto;
