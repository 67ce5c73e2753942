//! Content loading: resolve a path, walk it, parse files, merge the results.
//!
//! Directories are only watched. Regular files are read, handed to their
//! content handler, registered, and merged. Anything else aborts the walk at
//! that node; files merged before the failure stay merged.

use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{SourceError, SourceResult};
use crate::handlers::{SharedHandler, default_handler};
use crate::merge::merge;
use crate::state::{Shared, SourceState};
use crate::types::{ChangeEvent, ConfigMap};

/// Resolve `path` to an absolute, lexically clean form.
///
/// Symlinks are kept as named: a link that is later re-pointed keeps
/// resolving to the same registered path.
///
/// # Errors
/// [`SourceError::PathNotFound`] if nothing exists at `path`.
pub fn resolve(path: &Path) -> SourceResult<PathBuf> {
    let absolute = std::path::absolute(path).map_err(|e| SourceError::from_io(path, e))?;
    let resolved = clean(&absolute);
    fs::metadata(&resolved).map_err(|e| SourceError::from_io(&resolved, e))?;
    Ok(resolved)
}

/// Drop `.` components and fold `..` into its parent without touching disk.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Load `path` (file or directory tree) at `priority`.
pub(crate) fn load(
    shared: &Shared,
    path: &Path,
    priority: u32,
    handler: Option<SharedHandler>,
) -> SourceResult<()> {
    let root = resolve(path)?;
    let mut loaded = 0usize;

    // Symlinked directories below the root are watched but not descended.
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let failed = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
            tracing::error!("[loader] failed to walk {}: {e}", failed.display());
            SourceError::from_io(failed, e.into())
        })?;
        let entry_path = entry.path();
        let file_type = if entry.path_is_symlink() {
            fs::metadata(entry_path)
                .map_err(|e| SourceError::from_io(entry_path, e))?
                .file_type()
        } else {
            entry.file_type()
        };

        if file_type.is_dir() {
            if entry.depth() == 0 {
                let mut state = shared.state.lock();
                state.registry.register(&root, priority);
                state.handlers.register(&root, handler.clone());
            }
            shared.add_watch_target(entry_path);
        } else if file_type.is_file() {
            let result = load_file(shared, entry_path, priority, handler.clone());
            shared.add_watch_target(entry_path);
            if let Err(e) = result {
                tracing::error!("[loader] failed to handle file [{}]: {e}", entry_path.display());
                return Err(e);
            }
            loaded += 1;
        } else {
            tracing::error!(
                "[loader] file type of [{}] not supported",
                entry_path.display()
            );
            return Err(SourceError::UnsupportedType {
                path: entry_path.to_path_buf(),
            });
        }
    }

    crate::log_event!(
        "loader",
        "loaded",
        "{} ({loaded} files, priority {priority})",
        root.display()
    );
    Ok(())
}

/// Parse one regular file, register it, and merge its mapping.
fn load_file(
    shared: &Shared,
    path: &Path,
    priority: u32,
    handler: Option<SharedHandler>,
) -> SourceResult<()> {
    let mapping = read_mapping(path, handler.as_ref())?;

    let events = {
        let mut state = shared.state.lock();
        state.registry.register(path, priority);
        state.handlers.register(path, handler);
        merge_locked(&mut state, path, mapping)
    };

    crate::debug_event!("loader", "merged", "{} ({} events)", path.display(), events.len());
    shared.dispatch(&events);
    Ok(())
}

/// Re-read an already registered file with its recorded handler and merge it.
pub(crate) fn reload(shared: &Shared, path: &Path) -> SourceResult<Vec<ChangeEvent>> {
    let handler = shared.state.lock().handlers.resolve(path);
    let mapping = read_mapping(path, handler.as_ref())?;

    let events = {
        let mut state = shared.state.lock();
        merge_locked(&mut state, path, mapping)
    };

    crate::log_event!("loader", "reloaded", "{} ({} events)", path.display(), events.len());
    shared.dispatch(&events);
    Ok(events)
}

/// Reconcile a changed path: reload it if known, otherwise adopt it using the
/// priority and handler of its nearest registered ancestor.
pub(crate) fn reconcile(shared: &Shared, path: &Path) -> SourceResult<()> {
    let adopt = {
        let state = shared.state.lock();
        if state.registry.contains(path) {
            None
        } else {
            let priority = match state.registry.nearest_ancestor(path) {
                Some(ancestor) => ancestor.priority,
                None => {
                    crate::debug_event!(
                        "loader",
                        "no registered ancestor",
                        "{} falls back to priority {}",
                        path.display(),
                        shared.settings.fallback_priority
                    );
                    shared.settings.fallback_priority
                }
            };
            Some((priority, state.handlers.resolve(path)))
        }
    };

    match adopt {
        None if path.is_dir() => {
            crate::debug_event!("loader", "directory event", "{}", path.display());
            Ok(())
        }
        None => reload(shared, path).map(|_| ()),
        Some((priority, handler)) => {
            crate::log_event!("loader", "discovered", "{}", path.display());
            load(shared, path, priority, handler)
        }
    }
}

fn merge_locked(state: &mut SourceState, path: &Path, mapping: ConfigMap) -> Vec<ChangeEvent> {
    let SourceState {
        registry, store, ..
    } = state;
    merge(store, registry, path, mapping)
}

fn read_mapping(path: &Path, handler: Option<&SharedHandler>) -> SourceResult<ConfigMap> {
    let content = fs::read(path).map_err(|e| SourceError::from_io(path, e))?;

    let handler = handler.cloned().unwrap_or_else(default_handler);

    handler.parse(path, &content).map_err(|e| SourceError::HandlerFailed {
        path: path.to_path_buf(),
        reason: e.reason,
    })
}
