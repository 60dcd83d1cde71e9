//! Evidence key filters.

use std::collections::BTreeSet;
use std::fmt::Debug;

/// Decides which evidence keys a stage is interested in.
pub trait EvidenceKeyFilter: Send + Sync + Debug {
    /// Returns true if the key is of interest.
    fn filter_evidence_key(&self, key: &str) -> bool;

    /// Returns the keys this filter names explicitly, if it has a fixed list.
    ///
    /// Predicate-style filters return an empty list.
    fn declared_keys(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Accepts an explicit, case-insensitive list of keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicListEvidenceKeyFilter {
    keys: BTreeSet<String>,
}

impl BasicListEvidenceKeyFilter {
    /// Creates a filter over the given keys.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keys: keys.into_iter().map(|k| k.as_ref().to_lowercase()).collect(),
        }
    }

    /// Creates a filter that accepts nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

impl EvidenceKeyFilter for BasicListEvidenceKeyFilter {
    fn filter_evidence_key(&self, key: &str) -> bool {
        self.keys.contains(&key.to_lowercase())
    }

    fn declared_keys(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }
}

/// Accepts every key that starts with one of the given prefixes.
///
/// Prefixes are compared case-insensitively, e.g. `"query."` or `"cookie."`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixEvidenceKeyFilter {
    prefixes: Vec<String>,
}

impl PrefixEvidenceKeyFilter {
    /// Creates a filter over the given prefixes.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .collect(),
        }
    }
}

impl EvidenceKeyFilter for PrefixEvidenceKeyFilter {
    fn filter_evidence_key(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }
}
