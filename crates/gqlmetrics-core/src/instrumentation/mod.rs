//! Post-execution instrumentation.

mod metrics;
mod observer;

pub use metrics::{
    MetricsInstrumentation, ERROR_COUNTER_METRIC_NAME, QUERY_TIME_METRIC_NAME,
    RESOLVER_TIME_METRIC_NAME, UNKNOWN_TAG_VALUE,
};
pub use observer::{CallbackObserver, ExecutionObserver, ExecutionPipeline};
