//! Source and handler bookkeeping.
//!
//! Tracks which paths have been registered, their priorities, and the content
//! handler to use when a path is reparsed. Neither registry locks on its own;
//! both live behind the source's single state lock.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::handlers::SharedHandler;
use crate::types::Source;

/// Ordered set of registered sources keyed by absolute path.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: IndexMap<PathBuf, u32>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` at `priority`.
    ///
    /// An existing path keeps its position and only has its priority replaced.
    pub fn register(&mut self, path: impl Into<PathBuf>, priority: u32) {
        self.sources.insert(path.into(), priority);
    }

    /// Priority of a registered path.
    pub fn priority_of(&self, path: &Path) -> Option<u32> {
        self.sources.get(path).copied()
    }

    /// Check if a path is registered.
    pub fn contains(&self, path: &Path) -> bool {
        self.sources.contains_key(path)
    }

    /// Most specific registered source that is a strict ancestor of `path`.
    ///
    /// Matching is by whole path components, so `/etc/app` is an ancestor of
    /// `/etc/app/db.conf` but not of `/etc/application.conf`.
    pub fn nearest_ancestor(&self, path: &Path) -> Option<Source> {
        self.sources
            .iter()
            .filter(|(candidate, _)| path != candidate.as_path() && path.starts_with(candidate))
            .max_by_key(|(candidate, _)| candidate.components().count())
            .map(|(candidate, priority)| Source {
                path: candidate.clone(),
                priority: *priority,
            })
    }

    /// Registered sources in insertion order.
    pub fn sources(&self) -> impl Iterator<Item = Source> + '_ {
        self.sources.iter().map(|(path, priority)| Source {
            path: path.clone(),
            priority: *priority,
        })
    }

    /// Registered paths in insertion order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.sources.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }
}

/// Content handler per registered path.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: IndexMap<PathBuf, Option<SharedHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the handler for `path`. `None` means "use the default parser".
    pub fn register(&mut self, path: impl Into<PathBuf>, handler: Option<SharedHandler>) {
        self.handlers.insert(path.into(), handler);
    }

    /// Handler recorded for exactly this path.
    ///
    /// The outer `Option` is whether the path is known at all; the inner one
    /// is the recorded handler.
    pub fn get(&self, path: &Path) -> Option<Option<SharedHandler>> {
        self.handlers.get(path).cloned()
    }

    /// Handler of the most specific registered ancestor of `path`.
    pub fn inherited(&self, path: &Path) -> Option<SharedHandler> {
        self.handlers
            .iter()
            .filter(|(candidate, _)| path != candidate.as_path() && path.starts_with(candidate))
            .max_by_key(|(candidate, _)| candidate.components().count())
            .and_then(|(_, handler)| handler.clone())
    }

    /// Resolve the handler for `path`: own entry first, then nearest ancestor.
    pub fn resolve(&self, path: &Path) -> Option<SharedHandler> {
        match self.get(path) {
            Some(Some(handler)) => Some(handler),
            _ => self.inherited(path),
        }
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.handlers
                    .iter()
                    .map(|(path, handler)| (path, handler.as_ref().map(|h| h.name().to_string()))),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{JsonHandler, TomlHandler};
    use std::sync::Arc;

    #[test]
    fn test_register_keeps_order_and_updates_in_place() {
        let mut registry = SourceRegistry::new();
        registry.register("/etc/a.conf", 3);
        registry.register("/etc/b.conf", 1);
        registry.register("/etc/a.conf", 7);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.priority_of(Path::new("/etc/a.conf")), Some(7));
        let paths: Vec<&Path> = registry.paths().collect();
        assert_eq!(paths, vec![Path::new("/etc/a.conf"), Path::new("/etc/b.conf")]);
    }

    #[test]
    fn test_priority_of_unknown() {
        let registry = SourceRegistry::new();
        assert_eq!(registry.priority_of(Path::new("/nope")), None);
        assert!(!registry.contains(Path::new("/nope")));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_nearest_ancestor_prefers_most_specific() {
        let mut registry = SourceRegistry::new();
        registry.register("/etc/app", 5);
        registry.register("/etc/app/overrides", 1);

        let found = registry
            .nearest_ancestor(Path::new("/etc/app/overrides/db.conf"))
            .unwrap();
        assert_eq!(found.path, PathBuf::from("/etc/app/overrides"));
        assert_eq!(found.priority, 1);

        let found = registry
            .nearest_ancestor(Path::new("/etc/app/db.conf"))
            .unwrap();
        assert_eq!(found.priority, 5);
    }

    #[test]
    fn test_nearest_ancestor_ignores_substring_siblings() {
        let mut registry = SourceRegistry::new();
        registry.register("/etc/app", 5);

        assert!(
            registry
                .nearest_ancestor(Path::new("/etc/application.conf"))
                .is_none()
        );
        assert!(registry.nearest_ancestor(Path::new("/etc/app")).is_none());
    }

    #[test]
    fn test_handler_resolution() {
        let mut handlers = HandlerRegistry::new();
        handlers.register("/cfg", Some(Arc::new(TomlHandler) as SharedHandler));
        handlers.register("/cfg/special.json", Some(Arc::new(JsonHandler) as SharedHandler));
        handlers.register("/cfg/plain.toml", None);

        let own = handlers.resolve(Path::new("/cfg/special.json")).unwrap();
        assert_eq!(own.name(), "json");

        let inherited = handlers.resolve(Path::new("/cfg/plain.toml")).unwrap();
        assert_eq!(inherited.name(), "toml");

        let nested = handlers.resolve(Path::new("/cfg/sub/new.toml")).unwrap();
        assert_eq!(nested.name(), "toml");

        assert!(handlers.resolve(Path::new("/other/x.conf")).is_none());
    }
}
