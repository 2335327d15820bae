//! Metrics observer.
//!
//! Turns the tracing report and error list of each execution result into
//! timers and counters on a `MeterRegistry`.

use std::sync::Arc;

use futures::future::{ready, Ready};
use gqlmetrics_proto::{ExecutionResult, GraphQLError};
use tracing::{debug, trace};

use super::observer::ExecutionObserver;
use crate::config::MetricsConfig;
use crate::error::Result;
use crate::metrics::{Counter, MeterId, MeterRegistry, Timer};

/// Timer for whole-operation phases.
pub const QUERY_TIME_METRIC_NAME: &str = "graphql.timer.query";
/// Timer for individual field resolvers.
pub const RESOLVER_TIME_METRIC_NAME: &str = "graphql.timer.resolver";
/// Counter for errors in execution results.
pub const ERROR_COUNTER_METRIC_NAME: &str = "graphql.counter.error";
/// Tag value used whenever the source data is absent.
pub const UNKNOWN_TAG_VALUE: &str = "unknown";

const OPERATION_NAME_TAG: &str = "operationName";
const OPERATION_TAG: &str = "operation";
const PARENT_TAG: &str = "parent";
const FIELD_TAG: &str = "field";
const PATH_TAG: &str = "path";
const CODE_TAG: &str = "code";
const CLASSIFICATION_TAG: &str = "classification";

const TIMER_DESCRIPTION: &str = "Timer that records the time to fetch the data by Operation Name";
const COUNTER_DESCRIPTION: &str =
    "Counter that records the nums to fetch the data by Operation Name";

// Values of the operation tag
const EXECUTION: &str = "execution";
const VALIDATION: &str = "validation";
const PARSING: &str = "parsing";
const RESOLVERS: &str = "resolvers";

/// Records query, resolver and error metrics from execution results.
///
/// Recording is best effort: parts of the tracing report or error entries that
/// are missing simply produce fewer metrics. Registry failures are returned.
pub struct MetricsInstrumentation {
    registry: Arc<dyn MeterRegistry>,
    tracing_enabled: bool,
}

impl MetricsInstrumentation {
    /// Create an instrumentation recording into `registry`.
    ///
    /// When `tracing_enabled` is false the tracing report is removed from each
    /// result after its metrics have been recorded.
    pub fn new(registry: Arc<dyn MeterRegistry>, tracing_enabled: bool) -> Self {
        Self {
            registry,
            tracing_enabled,
        }
    }

    /// Create an instrumentation from configuration.
    pub fn from_config(registry: Arc<dyn MeterRegistry>, config: &MetricsConfig) -> Self {
        Self::new(registry, config.tracing_enabled)
    }

    /// Whether tracing reports are left in the returned result.
    pub fn tracing_enabled(&self) -> bool {
        self.tracing_enabled
    }

    /// Record metrics for a completed execution, as an already-completed future.
    pub fn instrument_execution_result(
        &self,
        result: ExecutionResult,
        operation_name: Option<&str>,
    ) -> Ready<Result<ExecutionResult>> {
        ready(self.instrument(result, operation_name))
    }

    /// Record metrics for a completed execution.
    pub fn instrument(
        &self,
        mut result: ExecutionResult,
        operation_name: Option<&str>,
    ) -> Result<ExecutionResult> {
        let operation_name = tag_value(operation_name);
        self.record_tracing(&mut result, operation_name)?;
        self.record_errors(&result, operation_name)?;
        Ok(result)
    }

    fn record_tracing(&self, result: &mut ExecutionResult, operation_name: &str) -> Result<()> {
        let Some(report) = result.tracing() else {
            return Ok(());
        };

        if let Some(duration) = report.total_duration() {
            self.query_timer(operation_name, EXECUTION)?.record(duration);
        }

        // Parsing and validation are skipped when the document came from a cache
        if let Some(duration) = report.validation_duration() {
            self.query_timer(operation_name, VALIDATION)?.record(duration);
        }
        if let Some(duration) = report.parsing_duration() {
            self.query_timer(operation_name, PARSING)?.record(duration);
        }

        let mut recorded = 0;
        for resolver in report.resolvers() {
            let Some(duration) = resolver.elapsed() else {
                continue;
            };
            self.resolver_timer(
                operation_name,
                resolver.parent_type.as_deref(),
                resolver.field_name.as_deref(),
            )?
            .record(duration);
            recorded += 1;
        }

        debug!(
            operation_name,
            duration_ns = ?report.duration,
            resolvers = recorded,
            skipped = report.resolvers().len() - recorded,
            "Recorded execution timings"
        );

        if !self.tracing_enabled {
            result.remove_tracing();
            trace!(operation_name, "Removed tracing report from response");
        }
        Ok(())
    }

    fn record_errors(&self, result: &ExecutionResult, operation_name: &str) -> Result<()> {
        for error in &result.errors {
            self.error_counter(operation_name, error)?.increment();
        }
        if result.has_errors() {
            debug!(
                operation_name,
                errors = result.errors.len(),
                "Recorded execution errors"
            );
        }
        Ok(())
    }

    fn query_timer(&self, operation_name: &str, operation: &str) -> Result<Timer> {
        let id = MeterId::new(QUERY_TIME_METRIC_NAME)
            .with_description(TIMER_DESCRIPTION)
            .tag(OPERATION_NAME_TAG, operation_name)
            .tag(OPERATION_TAG, operation);
        self.registry.timer(&id)
    }

    fn resolver_timer(
        &self,
        operation_name: &str,
        parent: Option<&str>,
        field: Option<&str>,
    ) -> Result<Timer> {
        let id = MeterId::new(RESOLVER_TIME_METRIC_NAME)
            .with_description(TIMER_DESCRIPTION)
            .tag(OPERATION_NAME_TAG, operation_name)
            .tag(PARENT_TAG, tag_value(parent))
            .tag(FIELD_TAG, tag_value(field))
            .tag(OPERATION_TAG, RESOLVERS);
        self.registry.timer(&id)
    }

    fn error_counter(&self, operation_name: &str, error: &GraphQLError) -> Result<Counter> {
        let path = error.first_path_segment().map(ToString::to_string);
        let code = error.extension_text(CODE_TAG);
        let classification = error.extension_text(CLASSIFICATION_TAG);

        let id = MeterId::new(ERROR_COUNTER_METRIC_NAME)
            .with_description(COUNTER_DESCRIPTION)
            .tag(OPERATION_NAME_TAG, operation_name)
            .tag(PATH_TAG, tag_value(path.as_deref()))
            .tag(CODE_TAG, tag_value(code.as_deref()))
            .tag(CLASSIFICATION_TAG, tag_value(classification.as_deref()));
        self.registry.counter(&id)
    }
}

impl ExecutionObserver for MetricsInstrumentation {
    fn on_execution_complete(
        &self,
        result: ExecutionResult,
        operation_name: Option<&str>,
    ) -> Result<ExecutionResult> {
        self.instrument(result, operation_name)
    }

    fn name(&self) -> &str {
        "metrics"
    }
}

/// Tag value for optional source data; blank counts as absent.
fn tag_value(value: Option<&str>) -> &str {
    match value {
        Some(value) if !value.is_empty() => value,
        _ => UNKNOWN_TAG_VALUE,
    }
}
