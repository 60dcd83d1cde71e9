//! Per-stage result objects.

use super::PropertyValue;
use crate::errors::FlowError;
use std::collections::BTreeMap;

/// The result a stage writes into an execution context.
///
/// Property names are matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementData {
    stage: String,
    values: BTreeMap<String, PropertyValue>,
}

impl ElementData {
    /// Creates empty data owned by a stage.
    #[must_use]
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            values: BTreeMap::new(),
        }
    }

    /// Creates data from an iterator of name/value pairs.
    #[must_use]
    pub fn from_values<I, K>(stage: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, PropertyValue)>,
        K: Into<String>,
    {
        let mut data = Self::new(stage);
        for (name, value) in values {
            data.insert(name, value);
        }
        data
    }

    /// Adds a property value, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a property value.
    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.values.insert(name.into().to_lowercase(), value);
    }

    /// Returns the identity of the stage that owns this data.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Gets a property value.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::PropertyNotFound`] if the stage did not produce
    /// the property.
    pub fn get(&self, name: &str) -> Result<&PropertyValue, FlowError> {
        self.values
            .get(&name.to_lowercase())
            .ok_or_else(|| FlowError::PropertyNotFound {
                property: name.to_string(),
                stage: self.stage.clone(),
            })
    }

    /// Returns true if the property exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&name.to_lowercase())
    }

    /// Gets the present value of a property.
    ///
    /// # Errors
    ///
    /// Fails if the property is missing or its value is absent.
    pub fn value(&self, name: &str) -> Result<&serde_json::Value, FlowError> {
        self.get(name)?.value()
    }

    /// Gets a property as a string. Non-string values are rendered as JSON.
    pub fn get_as_string(&self, name: &str) -> Result<String, FlowError> {
        Ok(match self.value(name)? {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Gets a property as a float. Unconvertible values become `0.0`.
    pub fn get_as_float(&self, name: &str) -> Result<f64, FlowError> {
        Ok(match self.value(name)? {
            serde_json::Value::Number(n) => n.as_f64().unwrap_or_default(),
            serde_json::Value::String(s) => s.trim().parse().unwrap_or_default(),
            serde_json::Value::Bool(b) => f64::from(u8::from(*b)),
            _ => 0.0,
        })
    }

    /// Gets a property as an integer. Unconvertible values become `0`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_as_integer(&self, name: &str) -> Result<i64, FlowError> {
        Ok(match self.value(name)? {
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or_default(),
            serde_json::Value::String(s) => s.trim().parse().unwrap_or_default(),
            serde_json::Value::Bool(b) => i64::from(*b),
            _ => 0,
        })
    }

    /// Returns all values keyed by lower-cased property name.
    #[must_use]
    pub fn as_dictionary(&self) -> &BTreeMap<String, PropertyValue> {
        &self.values
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no properties were written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
