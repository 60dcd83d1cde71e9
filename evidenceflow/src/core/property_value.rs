//! Present/absent property value wrapper.

use crate::errors::FlowError;
use serde::{Deserialize, Serialize};

/// A property value that may be missing, with an explanation when it is.
///
/// Stages use [`PropertyValue::Absent`] when they ran but could not determine
/// a value (no match, evidence missing, and so on). Absence is a checked state:
/// [`PropertyValue::value`] returns a [`FlowError::NoValue`] carrying the
/// reason instead of panicking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue<T = serde_json::Value> {
    /// The value is known.
    Present(T),
    /// The value is not available.
    Absent {
        /// Why the value is not available.
        reason: Option<String>,
    },
}

impl<T> PropertyValue<T> {
    /// Creates a present value.
    pub fn present(value: T) -> Self {
        Self::Present(value)
    }

    /// Creates an absent value with a reason.
    pub fn absent(reason: impl Into<String>) -> Self {
        Self::Absent {
            reason: Some(reason.into()),
        }
    }

    /// Creates an absent value without a reason.
    pub const fn no_value() -> Self {
        Self::Absent { reason: None }
    }

    /// Returns true if a value is present.
    pub const fn has_value(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Returns the value, or a missing-value fault carrying the reason.
    pub fn value(&self) -> Result<&T, FlowError> {
        match self {
            Self::Present(value) => Ok(value),
            Self::Absent { reason } => Err(FlowError::no_value(reason.clone())),
        }
    }

    /// Consumes the wrapper and returns the value.
    pub fn into_value(self) -> Result<T, FlowError> {
        match self {
            Self::Present(value) => Ok(value),
            Self::Absent { reason } => Err(FlowError::no_value(reason)),
        }
    }

    /// Returns the reason the value is absent, if any.
    pub fn no_value_message(&self) -> Option<&str> {
        match self {
            Self::Present(_) => None,
            Self::Absent { reason } => reason.as_deref(),
        }
    }

    /// Sets the value, making it present.
    pub fn set_value(&mut self, value: T) {
        *self = Self::Present(value);
    }

    /// Returns the value as an option, discarding the reason.
    pub const fn as_option(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent { .. } => None,
        }
    }
}

impl<T> Default for PropertyValue<T> {
    fn default() -> Self {
        Self::no_value()
    }
}

impl<T> From<Option<T>> for PropertyValue<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or_else(Self::no_value, Self::Present)
    }
}

impl PropertyValue<serde_json::Value> {
    /// Wraps anything JSON-convertible as a present value.
    pub fn json(value: impl Into<serde_json::Value>) -> Self {
        Self::Present(value.into())
    }

    /// Returns the value as a string slice if it is a present JSON string.
    pub fn as_str(&self) -> Option<&str> {
        self.as_option().and_then(serde_json::Value::as_str)
    }
}
