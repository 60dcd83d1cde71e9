//! Error types for the evidenceflow pipeline.
//!
//! Stage failures are captured as [`StageFault`] values and stored on the
//! execution context. Everything else a caller can trip over while reading
//! results or building a pipeline is a [`FlowError`] variant.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Key under which faults that are not owned by any stage are recorded.
pub const GLOBAL_FAULT_KEY: &str = "global";

/// Message recorded when a context is run a second time.
pub const ALREADY_PROCESSED_MESSAGE: &str = "execution context already processed";

/// The main error type for evidenceflow operations.
#[derive(Debug, Clone, Error)]
pub enum FlowError {
    /// A stage failed during processing, or the context was re-run.
    #[error("{0}")]
    Stage(#[from] StageFault),

    /// No stage has written any data to the context yet.
    #[error("There is no element data for '{key}' against this execution context: no stage has produced data yet")]
    NoElementData {
        /// The requested stage identity.
        key: String,
    },

    /// The requested stage has not written data, but others have.
    #[error("There is no element data for '{key}' against this execution context. Available element data keys are: {}", available.join(", "))]
    UnknownElementData {
        /// The requested stage identity.
        key: String,
        /// Stage identities that did produce data.
        available: Vec<String>,
    },

    /// The stage identity is not registered in the pipeline.
    #[error("Stage '{key}' is not registered in this pipeline")]
    UnknownStage {
        /// The stage identity.
        key: String,
    },

    /// Two stages in one pipeline share an identity.
    #[error("Duplicate stage identity '{key}' in pipeline")]
    DuplicateStage {
        /// The duplicated identity.
        key: String,
    },

    /// The property is not part of a stage's result.
    #[error("Property '{property}' not found in data for stage '{stage}'")]
    PropertyNotFound {
        /// The property name.
        property: String,
        /// The stage identity.
        stage: String,
    },

    /// An absent property value was read.
    #[error("{}", reason.as_deref().unwrap_or("Property value is not available"))]
    NoValue {
        /// Why the value is absent, if known.
        reason: Option<String>,
    },

    /// A header-contributing property does not start with the header prefix.
    #[error("Property '{property}' is not a header-contributor: it must start with 'SetHeader'")]
    NotSetHeaderProperty {
        /// The offending property name.
        property: String,
    },

    /// A header-contributing property does not follow the naming convention.
    #[error("Property '{property}' has the wrong format: expected 'SetHeader[Component][HeaderName]' with both parts starting with an upper-case letter")]
    HeaderPropertyFormat {
        /// The offending property name.
        property: String,
    },

    /// A stage wrote a second result into the same context.
    #[error("Data conflict: element data for '{key}' already exists")]
    DataConflict {
        /// The stage identity.
        key: String,
    },

    /// Pipeline settings could not be parsed.
    #[error("Invalid pipeline settings: {0}")]
    Settings(String),
}

impl FlowError {
    /// Creates a missing-value fault.
    #[must_use]
    pub fn no_value(reason: Option<String>) -> Self {
        Self::NoValue { reason }
    }

    /// Returns the stage fault, if this error carries one.
    #[must_use]
    pub fn as_stage_fault(&self) -> Option<&StageFault> {
        match self {
            Self::Stage(fault) => Some(fault),
            _ => None,
        }
    }
}

/// A fault recorded against a stage (or the global key) during a run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Error occurred during processing of {stage}: {message}")]
pub struct StageFault {
    /// Identity of the failing stage, or [`GLOBAL_FAULT_KEY`].
    pub stage: String,
    /// Rendered error chain.
    pub message: String,
}

impl StageFault {
    /// Creates a new stage fault.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Creates a fault from the error returned by a stage's `process`.
    #[must_use]
    pub fn from_error(stage: impl Into<String>, error: &anyhow::Error) -> Self {
        Self::new(stage, format!("{error:#}"))
    }

    /// The fault recorded when a context is processed twice.
    #[must_use]
    pub fn already_processed() -> Self {
        Self::new(GLOBAL_FAULT_KEY, ALREADY_PROCESSED_MESSAGE)
    }

    /// Returns true if this fault is not owned by a stage.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.stage == GLOBAL_FAULT_KEY
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("stage".to_string(), serde_json::json!(self.stage));
        map.insert("message".to_string(), serde_json::json!(self.message));
        map
    }
}
