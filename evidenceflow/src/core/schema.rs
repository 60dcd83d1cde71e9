//! Property schemas declared by stages.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Describes one property a stage can produce.
///
/// Metadata is an open set of tags. Only string-valued tags take part in
/// metadata lookups; other values are carried for consumers but never indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// The property name.
    pub name: String,
    /// Metadata tags.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl PropertyDescriptor {
    /// Creates a descriptor with no metadata.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Adds a metadata tag.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns a metadata tag.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    /// Iterates over the string-valued tags only.
    pub fn string_tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| (k.as_str(), v)))
    }
}

/// An ordered set of property descriptors, unique by case-insensitive name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySchema {
    properties: Vec<PropertyDescriptor>,
}

impl PropertySchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a property, builder style.
    #[must_use]
    pub fn with_property(mut self, property: PropertyDescriptor) -> Self {
        self.insert(property);
        self
    }

    /// Adds a property, replacing any existing one with the same name.
    pub fn insert(&mut self, property: PropertyDescriptor) {
        match self.position(&property.name) {
            Some(idx) => self.properties[idx] = property,
            None => self.properties.push(property),
        }
    }

    /// Gets a property by case-insensitive name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.position(name).map(|idx| &self.properties[idx])
    }

    /// Returns true if the schema declares the property.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Iterates in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, PropertyDescriptor> {
        self.properties.iter()
    }

    /// Returns property names in declaration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.properties.iter().map(|p| p.name.as_str()).collect()
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns true if the schema is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Returns the names of properties that differ between two schemas.
    ///
    /// A property differs if it was added, removed, or its metadata changed.
    /// Names are lower-cased and sorted.
    #[must_use]
    pub fn diff(&self, other: &Self) -> Vec<String> {
        let mut changed = BTreeSet::new();

        for property in &self.properties {
            match other.get(&property.name) {
                Some(theirs) if theirs.metadata == property.metadata => {}
                _ => {
                    changed.insert(property.name.to_lowercase());
                }
            }
        }
        for property in &other.properties {
            if !self.contains(&property.name) {
                changed.insert(property.name.to_lowercase());
            }
        }

        changed.into_iter().collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.properties
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
    }
}

impl FromIterator<PropertyDescriptor> for PropertySchema {
    fn from_iter<I: IntoIterator<Item = PropertyDescriptor>>(iter: I) -> Self {
        let mut schema = Self::new();
        for property in iter {
            schema.insert(property);
        }
        schema
    }
}

impl<'a> IntoIterator for &'a PropertySchema {
    type Item = &'a PropertyDescriptor;
    type IntoIter = std::slice::Iter<'a, PropertyDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Interior-mutable schema holder for stages whose properties are only known
/// after construction.
///
/// Replacing the schema does not re-index anything by itself: the owner of
/// the pipeline must call `Pipeline::refresh_stage_schema` afterwards.
#[derive(Debug, Default)]
pub struct SchemaCell {
    schema: RwLock<PropertySchema>,
}

impl SchemaCell {
    /// Creates a cell holding the given schema.
    #[must_use]
    pub fn new(schema: PropertySchema) -> Self {
        Self {
            schema: RwLock::new(schema),
        }
    }

    /// Returns a copy of the current schema.
    #[must_use]
    pub fn snapshot(&self) -> PropertySchema {
        self.schema.read().clone()
    }

    /// Replaces the schema and returns the names of changed properties.
    pub fn replace(&self, schema: PropertySchema) -> Vec<String> {
        let mut current = self.schema.write();
        let changed = current.diff(&schema);
        *current = schema;
        changed
    }

    /// Mutates the schema in place and returns the names of changed properties.
    pub fn update<F>(&self, f: F) -> Vec<String>
    where
        F: FnOnce(&mut PropertySchema),
    {
        let mut current = self.schema.write();
        let before = current.clone();
        f(&mut current);
        before.diff(&current)
    }
}

impl Clone for SchemaCell {
    fn clone(&self) -> Self {
        Self::new(self.snapshot())
    }
}
