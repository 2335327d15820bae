//! Post-execution observers.
//!
//! An engine finishes a query, then hands the result to an
//! `ExecutionPipeline`, which threads it through every registered observer in
//! order. Observers may inspect the result, record from it, or redact parts of
//! it before it reaches the caller.

use std::fmt;
use std::sync::Arc;

use futures::future::{ready, Ready};
use gqlmetrics_proto::ExecutionResult;
use parking_lot::RwLock;
use tracing::trace;

use crate::error::Result;

/// A callback run once per completed execution.
pub trait ExecutionObserver: Send + Sync {
    /// Observe a completed execution and return the result to pass on.
    fn on_execution_complete(
        &self,
        result: ExecutionResult,
        operation_name: Option<&str>,
    ) -> Result<ExecutionResult>;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Adapts a closure into an observer.
pub struct CallbackObserver<F> {
    name: String,
    callback: F,
}

impl<F> CallbackObserver<F>
where
    F: Fn(ExecutionResult, Option<&str>) -> Result<ExecutionResult> + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(name: impl Into<String>, callback: F) -> Self {
        Self {
            name: name.into(),
            callback,
        }
    }
}

impl<F> ExecutionObserver for CallbackObserver<F>
where
    F: Fn(ExecutionResult, Option<&str>) -> Result<ExecutionResult> + Send + Sync,
{
    fn on_execution_complete(
        &self,
        result: ExecutionResult,
        operation_name: Option<&str>,
    ) -> Result<ExecutionResult> {
        (self.callback)(result, operation_name)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Ordered list of observers run after each execution.
#[derive(Default)]
pub struct ExecutionPipeline {
    observers: RwLock<Vec<Arc<dyn ExecutionObserver>>>,
}

impl ExecutionPipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observer.
    pub fn with_observer(self, observer: impl ExecutionObserver + 'static) -> Self {
        self.add_observer(Arc::new(observer));
        self
    }

    /// Append a closure as an observer.
    pub fn with_callback<F>(self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(ExecutionResult, Option<&str>) -> Result<ExecutionResult> + Send + Sync + 'static,
    {
        self.with_observer(CallbackObserver::new(name, callback))
    }

    /// Append a shared observer.
    pub fn add_observer(&self, observer: Arc<dyn ExecutionObserver>) {
        self.observers.write().push(observer);
    }

    /// Names of the registered observers, in order.
    pub fn observer_names(&self) -> Vec<String> {
        self.observers
            .read()
            .iter()
            .map(|observer| observer.name().to_string())
            .collect()
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// Check if no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Run every observer over a completed execution.
    ///
    /// Stops at the first observer error.
    pub fn complete(
        &self,
        result: ExecutionResult,
        operation_name: Option<&str>,
    ) -> Result<ExecutionResult> {
        // Observers run outside the lock so they may register further observers
        let observers = self.observers.read().clone();

        observers.iter().try_fold(result, |result, observer| {
            trace!(observer = observer.name(), "Running execution observer");
            observer.on_execution_complete(result, operation_name)
        })
    }

    /// Run every observer, returning an already-completed future.
    pub fn complete_async(
        &self,
        result: ExecutionResult,
        operation_name: Option<&str>,
    ) -> Ready<Result<ExecutionResult>> {
        ready(self.complete(result, operation_name))
    }
}

impl fmt::Debug for ExecutionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionPipeline")
            .field("observers", &self.observer_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use gqlmetrics_proto::{Extensions, GraphQLError};
    use serde_json::json;

    #[test]
    fn test_observers_run_in_order() {
        let pipeline = ExecutionPipeline::new()
            .with_callback("first", |result, _| {
                Ok(result.with_extensions(Extensions::new().with_entry("order", "first")))
            })
            .with_callback("second", |mut result, _| {
                if let Some(ext) = result.extensions.as_mut() {
                    let order = ext.get("order").and_then(|v| v.as_str()).unwrap_or_default();
                    let order = format!("{},second", order);
                    ext.insert("order", order);
                }
                Ok(result)
            });

        let result = pipeline
            .complete(ExecutionResult::new(json!({})), Some("GetUser"))
            .unwrap();

        assert_eq!(pipeline.observer_names(), vec!["first", "second"]);
        assert_eq!(
            result.extensions.unwrap().get("order"),
            Some(&json!("first,second"))
        );
    }

    #[test]
    fn test_operation_name_is_passed_through() {
        let pipeline = ExecutionPipeline::new().with_callback("tag", |result, operation_name| {
            Ok(result.with_error(GraphQLError::new(operation_name.unwrap_or("none"))))
        });

        let result = pipeline
            .complete(ExecutionResult::default(), Some("GetUser"))
            .unwrap();
        assert_eq!(result.errors[0].message, "GetUser");

        let result = pipeline.complete(ExecutionResult::default(), None).unwrap();
        assert_eq!(result.errors[0].message, "none");
    }

    #[test]
    fn test_first_error_stops_pipeline() {
        let pipeline = ExecutionPipeline::new()
            .with_callback("failing", |_, _| Err(Error::InvalidMeterName(String::new())))
            .with_callback("unreachable", |_, _| panic!("observer after failure ran"));

        let err = pipeline
            .complete(ExecutionResult::default(), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMeterName(_)));
    }

    #[test]
    fn test_empty_pipeline_returns_result_unchanged() {
        let pipeline = ExecutionPipeline::new();
        let input = ExecutionResult::new(json!({ "user": { "id": 1 } }));

        assert!(pipeline.is_empty());
        assert_eq!(pipeline.complete(input.clone(), None).unwrap(), input);
    }

    #[tokio::test]
    async fn test_complete_async_is_ready() {
        let pipeline = ExecutionPipeline::new().with_callback("noop", |result, _| Ok(result));
        pipeline.add_observer(Arc::new(CallbackObserver::new("shared", |result, _| Ok(result))));

        let result = pipeline
            .complete_async(ExecutionResult::default(), Some("Op"))
            .await
            .unwrap();

        assert_eq!(result, ExecutionResult::default());
        assert_eq!(pipeline.len(), 2);
    }
}
