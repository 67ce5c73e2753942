//! State shared between caller threads and the watch pump.
//!
//! Registry, handlers, store, and watch targets sit behind one mutex so that
//! merges are strictly serialized and reads see a consistent snapshot. The
//! listener and the notifier have their own locks and are never held while
//! the state lock is.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};

use crate::config::SourceSettings;
use crate::merge::Store;
use crate::registry::{HandlerRegistry, SourceRegistry};
use crate::types::ChangeEvent;
use crate::watcher::Notifier;

/// Receives change events produced by merges.
pub trait ConfigListener: Send + Sync {
    fn on_event(&self, event: &ChangeEvent);
}

impl<F> ConfigListener for F
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    fn on_event(&self, event: &ChangeEvent) {
        self(event)
    }
}

pub type SharedListener = Arc<dyn ConfigListener>;

#[derive(Debug, Default)]
pub(crate) struct SourceState {
    pub registry: SourceRegistry,
    pub handlers: HandlerRegistry,
    pub store: Store,
    /// Every path visited by a load, file or directory.
    pub watch_targets: IndexSet<PathBuf>,
}

impl SourceState {
    pub fn clear(&mut self) {
        self.registry.clear();
        self.handlers.clear();
        self.store.clear();
        self.watch_targets.clear();
    }
}

pub(crate) struct Shared {
    pub state: Mutex<SourceState>,
    pub settings: SourceSettings,
    listener: RwLock<Option<SharedListener>>,
    notifier: Mutex<Option<Box<dyn Notifier>>>,
}

impl Shared {
    pub fn new(settings: SourceSettings) -> Self {
        Self {
            state: Mutex::new(SourceState::default()),
            settings,
            listener: RwLock::new(None),
            notifier: Mutex::new(None),
        }
    }

    /// Forward events to the listener, in order. Dropped if none is attached.
    pub fn dispatch(&self, events: &[ChangeEvent]) {
        if events.is_empty() {
            return;
        }

        let listener = self.listener.read().clone();
        match listener {
            Some(listener) => {
                for event in events {
                    listener.on_event(event);
                }
            }
            None => {
                crate::debug_event!("source", "no listener", "{} events not forwarded", events.len());
            }
        }
    }

    pub fn set_listener(&self, listener: Option<SharedListener>) {
        *self.listener.write() = listener;
    }

    pub fn install_notifier(&self, notifier: Box<dyn Notifier>) {
        *self.notifier.lock() = Some(notifier);
    }

    pub fn release_notifier(&self) {
        let released = self.notifier.lock().take();
        drop(released);
    }

    /// Record `path` as a watch target and watch it if a notifier is open.
    pub fn add_watch_target(&self, path: &Path) {
        self.state.lock().watch_targets.insert(path.to_path_buf());
        self.watch(path);
    }

    pub fn watch_targets(&self) -> Vec<PathBuf> {
        self.state.lock().watch_targets.iter().cloned().collect()
    }

    pub fn watch(&self, path: &Path) {
        let mut guard = self.notifier.lock();
        let Some(notifier) = guard.as_mut() else {
            return;
        };

        match notifier.watch(path) {
            Ok(()) => crate::debug_event!("watcher", "watching", "{}", path.display()),
            Err(e) => tracing::error!("[watcher] add watcher file {} failed: {e}", path.display()),
        }
    }

    pub fn unwatch(&self, path: &Path) {
        let mut guard = self.notifier.lock();
        let Some(notifier) = guard.as_mut() else {
            return;
        };

        if let Err(e) = notifier.unwatch(path) {
            crate::debug_event!("watcher", "unwatch failed", "{}: {e}", path.display());
        }
    }
}
