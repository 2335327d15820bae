//! Execution result types.
//!
//! These mirror the response an engine produces for a single operation:
//! `data`, `errors` and `extensions`, serialized with the standard GraphQL
//! response field names.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::trace::{lenient, TracingRecord};

/// Extension key under which the engine attaches its tracing report.
pub const TRACING_EXTENSION: &str = "tracing";

/// The outcome of executing one operation against a schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Resolved data, if execution got far enough to produce any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Errors raised while executing the operation.
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub errors: Vec<GraphQLError>,
    /// Response extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Extensions>,
}

impl ExecutionResult {
    /// Create a result carrying the given data.
    pub fn new(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: vec![],
            extensions: None,
        }
    }

    /// Add an error to the result.
    pub fn with_error(mut self, error: GraphQLError) -> Self {
        self.errors.push(error);
        self
    }

    /// Replace the result extensions.
    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// Attach a tracing report, creating the extensions if needed.
    pub fn with_tracing(mut self, tracing: TracingRecord) -> Self {
        self.extensions.get_or_insert_with(Extensions::default).tracing = Some(tracing);
        self
    }

    /// Get the tracing report, if the engine attached one.
    pub fn tracing(&self) -> Option<&TracingRecord> {
        self.extensions.as_ref().and_then(|ext| ext.tracing.as_ref())
    }

    /// Remove the tracing report from the extensions and return it.
    pub fn remove_tracing(&mut self) -> Option<TracingRecord> {
        self.extensions.as_mut().and_then(Extensions::remove_tracing)
    }

    /// Check whether execution produced any errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Parse a result from its JSON response form.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Convert a JSON value into a result.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        serde_json::from_value(value).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Render the result in its JSON response form.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Some engines send `null` instead of omitting an empty list.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Response extensions.
///
/// The tracing report is held strongly typed; every other entry is kept
/// verbatim so that it round-trips to the caller untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extensions {
    /// Tracing report attached by the engine. A report that is not an object
    /// is dropped.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub tracing: Option<TracingRecord>,
    /// All other extension entries.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Extensions {
    /// Create empty extensions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tracing report.
    pub fn with_tracing(mut self, tracing: TracingRecord) -> Self {
        self.tracing = Some(tracing);
        self
    }

    /// Add an untyped extension entry.
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert an untyped extension entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.other.insert(key.into(), value.into());
    }

    /// Get an untyped extension entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.other.get(key)
    }

    /// Check whether an entry exists, including the tracing report.
    pub fn contains_key(&self, key: &str) -> bool {
        if key == TRACING_EXTENSION {
            self.tracing.is_some()
        } else {
            self.other.contains_key(key)
        }
    }

    /// Remove the tracing report.
    pub fn remove_tracing(&mut self) -> Option<TracingRecord> {
        self.tracing.take()
    }

    /// Number of entries, including the tracing report.
    pub fn len(&self) -> usize {
        self.other.len() + usize::from(self.tracing.is_some())
    }

    /// Check if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An error reported in an execution result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    /// Human-readable description.
    pub message: String,
    /// Source locations in the query document.
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub locations: Vec<Location>,
    /// Response path of the field that failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
    /// Additional error details such as `code` and `classification`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl GraphQLError {
    /// Create an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: vec![],
            path: None,
            extensions: None,
        }
    }

    /// Set the response path.
    pub fn with_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        self.path = Some(path.into_iter().map(Into::into).collect());
        self
    }

    /// Add a source location.
    pub fn with_location(mut self, line: u32, column: u32) -> Self {
        self.locations.push(Location { line, column });
        self
    }

    /// Add an extension entry.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// First segment of the response path.
    pub fn first_path_segment(&self) -> Option<&PathSegment> {
        self.path.as_ref().and_then(|path| path.first())
    }

    /// Get an extension entry.
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.as_ref().and_then(|ext| ext.get(key))
    }

    /// Get an extension entry as text.
    ///
    /// Strings are returned verbatim, other values as their JSON text. A JSON
    /// `null` counts as absent.
    pub fn extension_text(&self, key: &str) -> Option<String> {
        match self.extension(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A location in the query document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

/// One segment of a response path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// List index.
    Index(usize),
    /// Field name or alias.
    Field(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(index) => write!(f, "{}", index),
            PathSegment::Field(name) => f.write_str(name),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(name: &str) -> Self {
        PathSegment::Field(name.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(name: String) -> Self {
        PathSegment::Field(name)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}
