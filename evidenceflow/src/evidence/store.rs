//! Per-request evidence store.

use super::EvidenceKeyFilter;
use std::collections::HashMap;
use std::sync::Arc;

/// Key/value evidence about one request.
///
/// Keys are namespaced (`header.user-agent`, `query.session-id`) and
/// lower-cased on the way in. Entries keep their insertion order so filtered
/// views are deterministic.
///
/// A store created by a pipeline carries a gate: keys that no stage is
/// interested in are dropped on `set`.
#[derive(Debug, Clone, Default)]
pub struct EvidenceStore {
    entries: Vec<(String, serde_json::Value)>,
    positions: HashMap<String, usize>,
    gate: Option<Arc<dyn EvidenceKeyFilter>>,
}

impl EvidenceStore {
    /// Creates an ungated store that accepts every key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that only accepts keys passing the filter.
    #[must_use]
    pub fn gated(gate: Arc<dyn EvidenceKeyFilter>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    /// Returns true if the store would accept the key.
    #[must_use]
    pub fn accepts(&self, key: &str) -> bool {
        self.gate
            .as_ref()
            .map_or(true, |gate| gate.filter_evidence_key(key))
    }

    /// Sets a value, overwriting any existing one in place.
    ///
    /// Returns false if the key was rejected by the gate.
    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<serde_json::Value>) -> bool {
        let key = key.as_ref().to_lowercase();
        if !self.accepts(&key) {
            tracing::trace!(key = %key, "Evidence key rejected by filter");
            return false;
        }

        let value = value.into();
        match self.positions.get(&key) {
            Some(&idx) => self.entries[idx].1 = value,
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
        true
    }

    /// Sets every pair from an iterator and returns how many were accepted.
    pub fn set_from_map<I, K, V>(&mut self, values: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<serde_json::Value>,
    {
        let mut accepted = 0;
        for (key, value) in values {
            if self.set(key, value) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Gets a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.positions
            .get(&key.to_lowercase())
            .map(|&idx| &self.entries[idx].1)
    }

    /// Gets a value if it is a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(serde_json::Value::as_str)
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(&key.to_lowercase())
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns all keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Returns the entries accepted by a filter, in insertion order.
    #[must_use]
    pub fn filtered(&self, filter: &dyn EvidenceKeyFilter) -> Vec<(&str, &serde_json::Value)> {
        self.iter()
            .filter(|(k, _)| filter.filter_evidence_key(k))
            .collect()
    }

    /// Returns the entries whose key starts with a prefix such as `"query."`.
    #[must_use]
    pub fn with_prefix(&self, prefix: &str) -> Vec<(&str, &serde_json::Value)> {
        let prefix = prefix.to_lowercase();
        self.iter().filter(|(k, _)| k.starts_with(&prefix)).collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a copy of all entries as a JSON object.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Map<String, serde_json::Value> {
        self.entries.iter().cloned().collect()
    }
}
