//! The file-backed configuration source exposed to hosts.
//!
//! A host registers files and directory roots with [`FileSource::add_file`],
//! reads the merged view through [`ConfigSource`], and attaches a listener
//! with [`ConfigSource::dynamic_config_handler`] to receive change events as
//! files are edited on disk.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

use crate::config::SourceSettings;
use crate::error::{SourceError, SourceResult};
use crate::handlers::SharedHandler;
use crate::loader;
use crate::state::{Shared, SharedListener};
use crate::types::{ConfigEntry, ConfigMap, SOURCE_NAME, Source};
use crate::watcher::{FsNotifier, Notifier, NotifierChannels, WatchCoordinator, WatchState};

/// Contract between a configuration backend and the host that aggregates it.
pub trait ConfigSource: Send + Sync {
    /// Snapshot of every merged key.
    fn get_configurations(&self) -> ConfigMap;

    /// Current value of `key`.
    ///
    /// # Errors
    /// [`SourceError::KeyNotFound`] if no source supplies `key`.
    fn get_configuration_by_key(&self, key: &str) -> SourceResult<Value>;

    fn source_name(&self) -> &'static str;

    /// Priority of this backend relative to the host's other backends.
    fn priority(&self) -> i32;

    fn set_priority(&self, priority: i32);

    /// Attach `listener` and begin watching every registered path.
    ///
    /// # Errors
    /// [`SourceError::InvalidArgument`] if `listener` is `None`, or
    /// [`SourceError::NotifierInit`] if the platform watcher cannot start.
    fn dynamic_config_handler(&self, listener: Option<SharedListener>) -> SourceResult<()>;

    /// Stop watching and forget every source, handler, and key.
    fn cleanup(&self) -> SourceResult<()>;
}

/// Configuration source backed by files and directory trees.
pub struct FileSource {
    shared: Arc<Shared>,
    priority: AtomicI32,
    coordinator: Mutex<Option<Arc<WatchCoordinator>>>,
}

impl FileSource {
    /// Create a source with default settings.
    pub fn new() -> Self {
        Self::with_settings(SourceSettings::default())
    }

    pub fn with_settings(settings: SourceSettings) -> Self {
        let priority = settings.source_priority;
        Self {
            shared: Arc::new(Shared::new(settings)),
            priority: AtomicI32::new(priority),
            coordinator: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &SourceSettings {
        &self.shared.settings
    }

    /// Register a file or directory root at `priority` and merge its content.
    ///
    /// Lower priority values win. Directories are walked recursively and
    /// every regular file inside is loaded with the same priority and
    /// handler. Re-adding an already registered path does nothing.
    ///
    /// # Errors
    /// - [`SourceError::PathNotFound`] if `path` does not exist
    /// - [`SourceError::HandlerFailed`] if a file cannot be parsed
    /// - [`SourceError::UnsupportedType`] for anything that is neither a
    ///   regular file nor a directory
    ///
    /// Files loaded before a failure stay loaded.
    pub fn add_file(
        &self,
        path: impl AsRef<Path>,
        priority: u32,
        handler: Option<SharedHandler>,
    ) -> SourceResult<()> {
        let resolved = loader::resolve(path.as_ref())?;

        if self.shared.state.lock().registry.contains(&resolved) {
            crate::debug_event!("source", "already registered", "{}", resolved.display());
            return Ok(());
        }

        loader::load(&self.shared, &resolved, priority, handler)
    }

    /// Like [`ConfigSource::dynamic_config_handler`], with a caller-supplied
    /// notifier in place of the platform watcher.
    ///
    /// Any previous subscription is stopped first.
    pub fn dynamic_config_handler_with<F>(
        &self,
        listener: Option<SharedListener>,
        open: F,
    ) -> SourceResult<()>
    where
        F: FnOnce() -> SourceResult<(Box<dyn Notifier>, NotifierChannels)>,
    {
        if listener.is_none() {
            return Err(SourceError::InvalidArgument {
                reason: "call back can not be empty".to_string(),
            });
        }

        let previous = self.coordinator.lock().take();
        if let Some(previous) = previous {
            previous.stop();
        }

        let coordinator = Arc::new(WatchCoordinator::new(self.shared.clone()));
        coordinator.start(listener, open)?;
        *self.coordinator.lock() = Some(coordinator);
        Ok(())
    }

    /// State of the current watch subscription, `Idle` if there is none.
    pub fn watch_state(&self) -> WatchState {
        self.coordinator
            .lock()
            .as_ref()
            .map_or(WatchState::Idle, |coordinator| coordinator.state())
    }

    /// Every registered file and directory root, in registration order.
    pub fn sources(&self) -> Vec<Source> {
        self.shared.state.lock().registry.sources().collect()
    }

    /// The merged entry for `key`, including the path that supplies it.
    pub fn entry(&self, key: &str) -> Option<ConfigEntry> {
        self.shared.state.lock().store.get(key).cloned()
    }

    /// Reconcile `path` now, as if the watcher had reported a write to it.
    ///
    /// # Errors
    /// Same as [`FileSource::add_file`].
    pub fn refresh(&self, path: impl AsRef<Path>) -> SourceResult<()> {
        let resolved = loader::resolve(path.as_ref())?;
        loader::reconcile(&self.shared, &resolved)
    }
}

impl Default for FileSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for FileSource {
    fn get_configurations(&self) -> ConfigMap {
        self.shared.state.lock().store.snapshot()
    }

    fn get_configuration_by_key(&self, key: &str) -> SourceResult<Value> {
        self.shared
            .state
            .lock()
            .store
            .get(key)
            .map(|entry| entry.value.clone())
            .ok_or_else(|| SourceError::KeyNotFound {
                key: key.to_string(),
            })
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn priority(&self) -> i32 {
        self.priority.load(Ordering::Relaxed)
    }

    fn set_priority(&self, priority: i32) {
        self.priority.store(priority, Ordering::Relaxed);
    }

    fn dynamic_config_handler(&self, listener: Option<SharedListener>) -> SourceResult<()> {
        self.dynamic_config_handler_with(listener, || {
            let (notifier, channels) = FsNotifier::open()?;
            Ok((Box::new(notifier) as Box<dyn Notifier>, channels))
        })
    }

    fn cleanup(&self) -> SourceResult<()> {
        let coordinator = self.coordinator.lock().take();
        if let Some(coordinator) = coordinator {
            coordinator.stop();
        }

        self.shared.state.lock().clear();
        crate::log_event!("source", "cleaned up");
        Ok(())
    }
}
