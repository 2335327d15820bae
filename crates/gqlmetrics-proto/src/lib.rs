//! gqlmetrics protocol types.
//!
//! This crate defines the data that flows from a GraphQL execution engine into
//! the instrumentation layer: the execution result with its error list and
//! extensions, the Apollo-format tracing report, and snapshot types for the
//! meters recorded from them.

pub mod error;
pub mod metrics;
pub mod result;
pub mod trace;

pub use error::Error;
pub use metrics::{CounterStats, MeterKind, MeterSnapshot, MeterStats, TimerStats};
pub use result::{
    ExecutionResult, Extensions, GraphQLError, Location, PathSegment, TRACING_EXTENSION,
};
pub use trace::{ExecutionTiming, PhaseTiming, ResolverTiming, TracingRecord};
