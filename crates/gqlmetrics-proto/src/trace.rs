//! Apollo-format tracing report.
//!
//! Engines that support tracing attach this report under the `tracing`
//! extension key. All durations and offsets are in nanoseconds.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::result::PathSegment;

fn default_version() -> u32 {
    1
}

/// Deserialize a field that may be missing, null or malformed as `None`.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| serde_json::from_value(value).ok()))
}

/// Like `lenient`, falling back to the type's default.
fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

fn lenient_version<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient(deserializer)?.unwrap_or_else(default_version))
}

/// Timing report for one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracingRecord {
    /// Report format version.
    #[serde(default = "default_version", deserialize_with = "lenient_version")]
    pub version: u32,
    /// Wall-clock start of the request.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Wall-clock end of the request.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Overall duration in nanoseconds.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    /// Parsing phase timing. Missing when the document came from a cache.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub parsing: Option<PhaseTiming>,
    /// Validation phase timing. Missing when the document came from a cache.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub validation: Option<PhaseTiming>,
    /// Execution phase timing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionTiming>,
}

impl TracingRecord {
    /// Create a report with only the overall duration.
    pub fn new(duration_nanos: u64) -> Self {
        Self {
            version: default_version(),
            start_time: None,
            end_time: None,
            duration: Some(duration_nanos),
            parsing: None,
            validation: None,
            execution: None,
        }
    }

    /// Set the parsing duration.
    pub fn with_parsing(mut self, duration_nanos: u64) -> Self {
        self.parsing = Some(PhaseTiming::new(duration_nanos));
        self
    }

    /// Set the validation duration.
    pub fn with_validation(mut self, duration_nanos: u64) -> Self {
        self.validation = Some(PhaseTiming::new(duration_nanos));
        self
    }

    /// Append a resolver timing to the execution phase.
    pub fn with_resolver(mut self, resolver: ResolverTiming) -> Self {
        self.execution
            .get_or_insert_with(ExecutionTiming::default)
            .resolvers
            .get_or_insert_with(Vec::new)
            .push(resolver);
        self
    }

    /// Set the wall-clock bounds of the request.
    pub fn with_times(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    /// Overall duration, when reported.
    pub fn total_duration(&self) -> Option<Duration> {
        self.duration.map(Duration::from_nanos)
    }

    /// Parsing duration, when reported.
    pub fn parsing_duration(&self) -> Option<Duration> {
        self.parsing.as_ref().and_then(PhaseTiming::elapsed)
    }

    /// Validation duration, when reported.
    pub fn validation_duration(&self) -> Option<Duration> {
        self.validation.as_ref().and_then(PhaseTiming::elapsed)
    }

    /// Resolver timings, empty when the execution phase reported none.
    pub fn resolvers(&self) -> &[ResolverTiming] {
        self.execution
            .as_ref()
            .and_then(|execution| execution.resolvers.as_deref())
            .unwrap_or(&[])
    }
}

/// Timing of a parsing or validation phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTiming {
    /// Offset from the request start.
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub start_offset: u64,
    /// Phase duration.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl PhaseTiming {
    /// Create a phase timing starting at offset zero.
    pub fn new(duration_nanos: u64) -> Self {
        Self {
            start_offset: 0,
            duration: Some(duration_nanos),
        }
    }

    /// Phase duration, when reported.
    pub fn elapsed(&self) -> Option<Duration> {
        self.duration.map(Duration::from_nanos)
    }
}

/// Timing of the execution phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTiming {
    /// Per-field resolver timings.
    #[serde(
        default,
        deserialize_with = "lenient_resolvers",
        skip_serializing_if = "Option::is_none"
    )]
    pub resolvers: Option<Vec<ResolverTiming>>,
}

/// Keep the well-formed resolver entries and drop the rest.
fn lenient_resolvers<'de, D>(deserializer: D) -> Result<Option<Vec<ResolverTiming>>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Option<Vec<Value>> = lenient(deserializer)?;
    Ok(entries.map(|entries| {
        entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect()
    }))
}

/// Timing of a single field resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverTiming {
    /// Response path of the resolved field.
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub path: Vec<PathSegment>,
    /// Name of the type declaring the field.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub parent_type: Option<String>,
    /// Name of the field.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    /// Declared return type of the field.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    /// Offset from the request start.
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub start_offset: u64,
    /// Resolver duration.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl ResolverTiming {
    /// Create a resolver timing for `parent_type.field_name`.
    pub fn new(
        parent_type: impl Into<String>,
        field_name: impl Into<String>,
        duration_nanos: u64,
    ) -> Self {
        let field_name = field_name.into();
        Self {
            path: vec![PathSegment::Field(field_name.clone())],
            parent_type: Some(parent_type.into()),
            field_name: Some(field_name),
            return_type: None,
            start_offset: 0,
            duration: Some(duration_nanos),
        }
    }

    /// Set the response path.
    pub fn with_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }

    /// Set the return type.
    pub fn with_return_type(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }

    /// Resolver duration, when reported.
    pub fn elapsed(&self) -> Option<Duration> {
        self.duration.map(Duration::from_nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_apollo_report() {
        let record: TracingRecord = serde_json::from_value(json!({
            "version": 1,
            "startTime": "2024-03-01T10:00:00.000Z",
            "endTime": "2024-03-01T10:00:00.005Z",
            "duration": 5_000_000,
            "parsing": { "startOffset": 10, "duration": 200 },
            "validation": { "startOffset": 220, "duration": 100 },
            "execution": {
                "resolvers": [{
                    "path": ["users", 0, "email"],
                    "parentType": "User",
                    "fieldName": "email",
                    "returnType": "String",
                    "startOffset": 400,
                    "duration": 30
                }]
            }
        }))
        .unwrap();

        assert_eq!(record.total_duration(), Some(Duration::from_millis(5)));
        assert_eq!(record.parsing_duration(), Some(Duration::from_nanos(200)));
        assert_eq!(record.validation_duration(), Some(Duration::from_nanos(100)));
        assert!(record.start_time.is_some());

        let resolvers = record.resolvers();
        assert_eq!(resolvers.len(), 1);
        assert_eq!(resolvers[0].parent_type.as_deref(), Some("User"));
        assert_eq!(resolvers[0].path[1], PathSegment::Index(0));
        assert_eq!(resolvers[0].elapsed(), Some(Duration::from_nanos(30)));
    }

    #[test]
    fn test_cached_document_has_no_phases() {
        let record: TracingRecord = serde_json::from_value(json!({
            "duration": 900,
            "parsing": { "startOffset": 0 },
            "execution": {}
        }))
        .unwrap();

        assert_eq!(record.version, 1);
        assert_eq!(record.parsing_duration(), None);
        assert_eq!(record.validation_duration(), None);
        assert!(record.resolvers().is_empty());
    }

    #[test]
    fn test_builder_appends_resolvers() {
        let record = TracingRecord::new(1_000)
            .with_resolver(ResolverTiming::new("Query", "user", 50))
            .with_resolver(
                ResolverTiming::new("User", "email", 30)
                    .with_path(["user", "email"])
                    .with_return_type("String"),
            );

        let fields: Vec<_> = record
            .resolvers()
            .iter()
            .map(|r| r.field_name.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(fields, vec!["user", "email"]);
        assert_eq!(record.resolvers()[1].path.len(), 2);
    }

    #[test]
    fn test_missing_duration_is_tolerated() {
        let record: TracingRecord =
            serde_json::from_value(json!({ "version": 1, "execution": {} })).unwrap();
        assert_eq!(record.total_duration(), None);
        assert!(record.resolvers().is_empty());
    }

    #[test]
    fn test_malformed_entries_are_dropped_individually() {
        let record: TracingRecord = serde_json::from_value(json!({
            "version": "one",
            "startTime": "yesterday",
            "duration": "fast",
            "validation": { "startOffset": -5, "duration": 80 },
            "parsing": "cached",
            "execution": {
                "resolvers": [
                    { "parentType": "Query", "fieldName": "user", "duration": 40 },
                    { "parentType": "User", "fieldName": "email" },
                    { "parentType": 7, "fieldName": "name", "duration": -1, "path": [true] },
                    "not a resolver"
                ]
            }
        }))
        .unwrap();

        assert_eq!(record.version, 1);
        assert_eq!(record.start_time, None);
        assert_eq!(record.total_duration(), None);
        assert_eq!(record.validation_duration(), Some(Duration::from_nanos(80)));
        assert_eq!(record.parsing_duration(), None);

        let resolvers = record.resolvers();
        assert_eq!(resolvers.len(), 3);
        assert_eq!(resolvers[0].elapsed(), Some(Duration::from_nanos(40)));
        assert_eq!(resolvers[1].elapsed(), None);
        assert_eq!(resolvers[2].parent_type, None);
        assert_eq!(resolvers[2].field_name.as_deref(), Some("name"));
        assert_eq!(resolvers[2].elapsed(), None);
        assert!(resolvers[2].path.is_empty());
    }
}
