//! Instrumentation configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Whether tracing reports are returned to callers by default.
pub const DEFAULT_TRACING_ENABLED: bool = false;

/// Metrics instrumentation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsConfig {
    /// Keep the tracing report in the response returned to the caller.
    ///
    /// When false the report is still turned into metrics, then stripped.
    pub tracing_enabled: bool,
}

impl MetricsConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether tracing reports reach the caller.
    pub fn with_tracing_enabled(mut self, enabled: bool) -> Self {
        self.tracing_enabled = enabled;
        self
    }

    /// Parse a configuration from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            tracing_enabled: DEFAULT_TRACING_ENABLED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_strips_tracing() {
        assert!(!MetricsConfig::default().tracing_enabled);
        assert!(MetricsConfig::new().with_tracing_enabled(true).tracing_enabled);
    }

    #[test]
    fn test_from_json() {
        let config = MetricsConfig::from_json(r#"{"tracingEnabled": true}"#).unwrap();
        assert!(config.tracing_enabled);

        let config = MetricsConfig::from_json("{}").unwrap();
        assert_eq!(config, MetricsConfig::default());

        let err = MetricsConfig::from_json(r#"{"tracingEnabled": "yes"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
