//! Priority-based merge of one source's mapping into the store.
//!
//! Conflict policy for a key already owned by another source, where `P` is
//! the incoming priority and `Q` the owner's (lower wins):
//!
//! | case    | result                                               |
//! |---------|------------------------------------------------------|
//! | `P < Q` | incoming value and ownership win, `Update` emitted   |
//! | `P == Q`| incoming value and ownership win, no event           |
//! | `P > Q` | existing value kept, incoming value dropped          |
//!
//! Keys owned by the incoming source are diffed against its new mapping:
//! missing keys are deleted, changed keys updated, equal keys left alone.
//! Keys nobody owned yet are created.

use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;

use crate::registry::SourceRegistry;
use crate::types::{ChangeEvent, ConfigEntry, ConfigMap};

/// Current key table with the owning source of every key.
#[derive(Debug, Default, Clone)]
pub struct Store {
    entries: IndexMap<String, ConfigEntry>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ConfigEntry> {
        self.entries.get(key)
    }

    /// Copy of every key and value.
    pub fn snapshot(&self) -> ConfigMap {
        self.entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Fold `mapping`, freshly loaded from `source`, into `store`.
///
/// Returns the change events in store order followed by creates in mapping
/// order. Each key appears at most once. An unregistered `source` is a no-op;
/// this covers files that were dropped between event detection and the merge.
pub fn merge(
    store: &mut Store,
    registry: &SourceRegistry,
    source: &Path,
    mapping: ConfigMap,
) -> Vec<ChangeEvent> {
    let Some(incoming) = registry.priority_of(source) else {
        crate::debug_event!("merge", "skipped unregistered", "{}", source.display());
        return Vec::new();
    };

    let mut events = Vec::new();
    let mut next = IndexMap::with_capacity(store.entries.len() + mapping.len());

    for (key, mut entry) in std::mem::take(&mut store.entries) {
        let offered = mapping.get(&key);

        if entry.owner == source {
            match offered {
                None => {
                    events.push(ChangeEvent::delete(key, entry.value));
                    continue;
                }
                Some(value) if *value == entry.value => {}
                Some(value) => {
                    entry.value = value.clone();
                    events.push(ChangeEvent::update(key.clone(), value.clone()));
                }
            }
        } else if let Some(value) = offered {
            let owner_priority = registry.priority_of(&entry.owner).unwrap_or(u32::MAX);
            resolve_contention(&mut entry, source, incoming, owner_priority, value, &mut events);
        }

        next.insert(key, entry);
    }

    for (key, value) in mapping {
        if next.contains_key(&key) {
            continue;
        }
        events.push(ChangeEvent::create(key.clone(), value.clone()));
        next.insert(
            key.clone(),
            ConfigEntry {
                key,
                value,
                owner: source.to_path_buf(),
            },
        );
    }

    store.entries = next;

    crate::debug_event!(
        "merge",
        "merged",
        "{} -> {} events, {} keys",
        source.display(),
        events.len(),
        store.entries.len()
    );

    events
}

/// Apply the priority policy for a key owned by another source.
fn resolve_contention(
    entry: &mut ConfigEntry,
    source: &Path,
    incoming: u32,
    owner_priority: u32,
    value: &Value,
    events: &mut Vec<ChangeEvent>,
) {
    if incoming > owner_priority {
        return;
    }

    // Ties overwrite without notifying subscribers.
    if incoming < owner_priority {
        events.push(ChangeEvent::update(entry.key.clone(), value.clone()));
    }

    entry.value = value.clone();
    entry.owner = source.to_path_buf();
}
