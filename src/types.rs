//! Core data types shared by the registry, merge engine, and watcher.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier reported as the origin of every change event.
pub const SOURCE_NAME: &str = "FileSource";

/// Backend priority seen by the host aggregator.
pub const DEFAULT_SOURCE_PRIORITY: i32 = 4;

/// Per-file priority used when the caller does not pick one.
pub const DEFAULT_FILE_PRIORITY: u32 = 0;

/// Flat key/value mapping produced by a content handler, in file order.
pub type ConfigMap = IndexMap<String, Value>;

/// A registered file or directory root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Absolute path of the source.
    pub path: PathBuf,
    /// Lower value wins when sources define the same key.
    pub priority: u32,
}

/// One key in the store together with the source that supplies it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: Value,
    /// Path of the registered source that currently owns this key.
    pub owner: PathBuf,
}

/// Kind of transition reported by a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

/// A single key transition produced by a merge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub source_name: &'static str,
    pub key: String,
    pub kind: EventKind,
    /// New value for create/update, last value for delete.
    pub value: Value,
}

impl ChangeEvent {
    pub fn create(key: impl Into<String>, value: Value) -> Self {
        Self::new(key, EventKind::Create, value)
    }

    pub fn update(key: impl Into<String>, value: Value) -> Self {
        Self::new(key, EventKind::Update, value)
    }

    pub fn delete(key: impl Into<String>, value: Value) -> Self {
        Self::new(key, EventKind::Delete, value)
    }

    fn new(key: impl Into<String>, kind: EventKind, value: Value) -> Self {
        Self {
            source_name: SOURCE_NAME,
            key: key.into(),
            kind,
            value,
        }
    }
}
