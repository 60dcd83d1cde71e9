//! Pipeline configuration.

use crate::errors::FlowError;
use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};

/// Settings recognized by [`PipelineBuilder`](super::PipelineBuilder).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// When true, `run()` never returns stage faults; callers inspect the
    /// context's fault map instead.
    pub suppress_process_exceptions: bool,
    /// Minimum level for the default `tracing` logger.
    pub log_level: LogLevel,
}

impl PipelineSettings {
    /// Creates default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses settings from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Settings`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        serde_json::from_str(json).map_err(|e| FlowError::Settings(e.to_string()))
    }

    /// Sets fault suppression.
    #[must_use]
    pub const fn with_suppress_process_exceptions(mut self, suppress: bool) -> Self {
        self.suppress_process_exceptions = suppress;
        self
    }

    /// Sets the minimum log level.
    #[must_use]
    pub const fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }
}
