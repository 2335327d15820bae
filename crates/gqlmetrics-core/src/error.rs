//! Core error types.

use gqlmetrics_proto::MeterKind;
use thiserror::Error;

/// Instrumentation and registry errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The meter name is already bound to a different kind.
    #[error("meter '{name}' is already registered as a {existing}, not a {requested}")]
    MeterKindConflict {
        name: String,
        existing: MeterKind,
        requested: MeterKind,
    },

    /// Metric names must not be blank.
    #[error("invalid meter name: {0:?}")]
    InvalidMeterName(String),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] gqlmetrics_proto::Error),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
