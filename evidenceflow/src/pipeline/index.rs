//! Cross-stage property metadata index.

use crate::core::{PropertyDescriptor, PropertySchema};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// One indexed property together with the stage that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Identity of the owning stage.
    pub stage: String,
    /// The property descriptor as declared.
    pub property: PropertyDescriptor,
}

/// A query result: which stage owns which property.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexHit {
    /// Identity of the owning stage.
    pub stage: String,
    /// Lower-cased property name.
    pub property: String,
}

// metadata key -> metadata value -> property name -> entry
type PropertyTable = BTreeMap<String, IndexEntry>;
type IndexTable = HashMap<String, HashMap<String, PropertyTable>>;

/// Maps metadata tags to the properties that carry them, across all stages.
///
/// Keys and values are lower-cased. Only string-valued tags are indexed.
///
/// Rebuilds are copy-on-write: the next table is built from a clone while
/// readers keep using the current one, then swapped in under a short write
/// lock. Rebuilds are serialized by the upgradable read lock, so two stages
/// refreshing at once cannot lose each other's entries.
#[derive(Debug, Default)]
pub struct PropertyMetadataIndex {
    table: RwLock<Arc<IndexTable>>,
}

impl PropertyMetadataIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every entry owned by `stage` with entries from `schema`.
    pub fn rebuild(&self, stage: &str, schema: &PropertySchema) {
        let current = self.table.upgradable_read();
        let mut next = IndexTable::clone(&current);

        let purged = purge_stage(&mut next, stage);
        let mut inserted = 0usize;

        for property in schema {
            let name = property.name.to_lowercase();
            for (meta_key, meta_value) in property.string_tags() {
                next.entry(meta_key.to_lowercase())
                    .or_default()
                    .entry(meta_value.to_lowercase())
                    .or_default()
                    .insert(
                        name.clone(),
                        IndexEntry {
                            stage: stage.to_string(),
                            property: property.clone(),
                        },
                    );
                inserted += 1;
            }
        }

        let mut current = RwLockUpgradableReadGuard::upgrade(current);
        *current = Arc::new(next);

        tracing::debug!(stage, purged, inserted, "Rebuilt property metadata index");
    }

    /// Removes every entry owned by `stage`.
    pub fn remove_stage(&self, stage: &str) {
        self.rebuild(stage, &PropertySchema::new());
    }

    /// Returns the properties tagged `meta_key = meta_value`.
    ///
    /// Matching is exact and case-insensitive. Results are ordered by
    /// property name.
    #[must_use]
    pub fn query(&self, meta_key: &str, meta_value: &str) -> Vec<IndexHit> {
        self.lookup(meta_key, meta_value)
            .into_iter()
            .map(|(property, entry)| IndexHit {
                stage: entry.stage,
                property,
            })
            .collect()
    }

    /// Like [`query`](Self::query) but returns the full descriptors.
    #[must_use]
    pub fn lookup(&self, meta_key: &str, meta_value: &str) -> Vec<(String, IndexEntry)> {
        let table = self.snapshot();
        table
            .get(&meta_key.to_lowercase())
            .and_then(|values| values.get(&meta_value.to_lowercase()))
            .map(|properties| {
                properties
                    .iter()
                    .map(|(name, entry)| (name.clone(), entry.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns every indexed metadata key, sorted.
    #[must_use]
    pub fn metadata_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.snapshot().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns the distinct properties owned by a stage, sorted.
    #[must_use]
    pub fn entries_for_stage(&self, stage: &str) -> Vec<IndexHit> {
        let table = self.snapshot();
        let hits: BTreeSet<IndexHit> = table
            .values()
            .flat_map(HashMap::values)
            .flat_map(|properties| properties.iter())
            .filter(|(_, entry)| entry.stage == stage)
            .map(|(name, entry)| IndexHit {
                stage: entry.stage.clone(),
                property: name.clone(),
            })
            .collect();
        hits.into_iter().collect()
    }

    /// Returns the number of `(key, value, property)` entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot()
            .values()
            .flat_map(HashMap::values)
            .map(BTreeMap::len)
            .sum()
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Arc<IndexTable> {
        Arc::clone(&self.table.read())
    }
}

fn purge_stage(table: &mut IndexTable, stage: &str) -> usize {
    let mut purged = 0;
    for values in table.values_mut() {
        for properties in values.values_mut() {
            let before = properties.len();
            properties.retain(|_, entry| entry.stage != stage);
            purged += before - properties.len();
        }
        values.retain(|_, properties| !properties.is_empty());
    }
    table.retain(|_, values| !values.is_empty());
    purged
}
