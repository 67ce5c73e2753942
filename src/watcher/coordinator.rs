//! Watch coordinator: owns the notifier subscription and the pump thread.
//!
//! ```text
//!  Idle --start--> Watching --stop / fatal notifier error--> Stopped
//!    \______________________stop__________________________/
//! ```
//!
//! The pump classifies raw events, filters editor noise, and reconciles the
//! affected path through the loader. A fatal notifier error ends the pump for
//! good; nothing restarts it, and the terminal state stays observable.

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, select};
use parking_lot::Mutex;

use super::notifier::{FsEvent, FsOp, Notifier, NotifierChannels};
use crate::error::{SourceError, SourceResult};
use crate::loader;
use crate::state::{Shared, SharedListener};

/// Lifecycle of a [`WatchCoordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// No active subscription.
    Idle,
    /// Subscribed and pumping events.
    Watching,
    /// Terminal: stopped by the caller or by a fatal notifier error.
    Stopped,
}

/// Drives reconciliation from filesystem events.
pub(crate) struct WatchCoordinator {
    shared: Arc<Shared>,
    state: Arc<Mutex<WatchState>>,
    shutdown: Mutex<Option<Sender<()>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl WatchCoordinator {
    pub fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            state: Arc::new(Mutex::new(WatchState::Idle)),
            shutdown: Mutex::new(None),
            pump: Mutex::new(None),
        }
    }

    pub fn state(&self) -> WatchState {
        *self.state.lock()
    }

    /// Attach `listener`, open the notifier, watch every known target, and
    /// start pumping in the background.
    ///
    /// # Errors
    /// - [`SourceError::InvalidArgument`] if `listener` is missing or the
    ///   coordinator has already left `Idle`
    /// - whatever `open` returns if the notifier cannot be created
    pub fn start<F>(&self, listener: Option<SharedListener>, open: F) -> SourceResult<()>
    where
        F: FnOnce() -> SourceResult<(Box<dyn Notifier>, NotifierChannels)>,
    {
        let listener = listener.ok_or_else(|| SourceError::InvalidArgument {
            reason: "call back can not be empty".to_string(),
        })?;

        if self.state() != WatchState::Idle {
            return Err(SourceError::InvalidArgument {
                reason: "watch coordinator was already started".to_string(),
            });
        }

        let (notifier, channels) = open().inspect_err(|e| {
            tracing::error!("[watcher] new file watcher failed: {e}");
        })?;

        self.shared.set_listener(Some(listener));
        self.shared.install_notifier(notifier);

        let targets = self.shared.watch_targets();
        for target in &targets {
            self.shared.watch(target);
        }

        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let pump = Pump {
            shared: self.shared.clone(),
            state: self.state.clone(),
            channels,
            shutdown: shutdown_rx,
        };

        *self.state.lock() = WatchState::Watching;

        let handle = thread::Builder::new()
            .name("confwatch-pump".to_string())
            .spawn(move || pump.run())
            .map_err(|e| {
                *self.state.lock() = WatchState::Stopped;
                self.shared.release_notifier();
                self.shared.set_listener(None);
                SourceError::NotifierInit {
                    reason: format!("failed to spawn watch pump: {e}"),
                }
            })?;

        *self.shutdown.lock() = Some(shutdown_tx);
        *self.pump.lock() = Some(handle);

        crate::log_event!("watcher", "started", "{} watch targets", targets.len());
        Ok(())
    }

    /// Stop pumping and release the notifier and listener. Idempotent.
    pub fn stop(&self) {
        *self.state.lock() = WatchState::Stopped;

        // Dropping the sender disconnects the pump's shutdown channel.
        drop(self.shutdown.lock().take());
        self.shared.release_notifier();
        self.shared.set_listener(None);

        let Some(handle) = self.pump.lock().take() else {
            return;
        };

        // A listener may stop the source from inside a callback.
        if handle.thread().id() == thread::current().id() {
            return;
        }

        if handle.join().is_err() {
            tracing::error!("[watcher] pump thread panicked");
        }
        crate::debug_event!("watcher", "pump joined");
    }
}

impl Drop for WatchCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Background half of the coordinator.
struct Pump {
    shared: Arc<Shared>,
    state: Arc<Mutex<WatchState>>,
    channels: NotifierChannels,
    shutdown: Receiver<()>,
}

impl Pump {
    fn run(self) {
        loop {
            select! {
                recv(self.channels.events) -> msg => match msg {
                    Ok(event) => {
                        if *self.state.lock() == WatchState::Stopped {
                            break;
                        }
                        self.handle_event(event);
                    }
                    Err(_) => {
                        tracing::warn!("[watcher] file watcher stop");
                        break;
                    }
                },
                recv(self.channels.errors) -> msg => {
                    match msg {
                        Ok(reason) => tracing::error!(
                            "[watcher] watch file error, reconciliation stopped: {reason}"
                        ),
                        Err(_) => tracing::warn!("[watcher] file watcher stop"),
                    }
                    break;
                },
                recv(self.shutdown) -> _ => break,
            }
        }

        *self.state.lock() = WatchState::Stopped;
        crate::log_event!("watcher", "stopped");
    }

    fn handle_event(&self, event: FsEvent) {
        let FsEvent { path, op } = event;

        if self.shared.settings.is_ignored(&path) {
            crate::debug_event!("watcher", "ignored", "{}", path.display());
            return;
        }

        match op {
            FsOp::Remove => {
                crate::debug_event!("watcher", "removed, skipping", "{}", path.display());
                return;
            }
            FsOp::Rename => {
                self.handle_rename(&path);
                return;
            }
            FsOp::Create => thread::sleep(self.shared.settings.settle_delay()),
            FsOp::Write => {}
        }

        crate::debug_event!("watcher", "reconcile", "{op:?} {}", path.display());
        if let Err(e) = loader::reconcile(&self.shared, &path) {
            tracing::error!("[watcher] failed to reconcile {}: {e}", path.display());
        }
    }

    /// Move the watch with the file: drop the old watch, re-add if the path
    /// still exists. No merge happens here.
    fn handle_rename(&self, path: &Path) {
        self.shared.unwatch(path);

        if path.exists() {
            self.shared.watch(path);
        } else {
            tracing::warn!(
                "[watcher] [{}] file does not exist so not able to watch further",
                path.display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceSettings;
    use crate::types::ChangeEvent;
    use crate::watcher::ManualNotifier;

    fn listener() -> Option<SharedListener> {
        Some(Arc::new(|_event: &ChangeEvent| {}))
    }

    fn manual() -> SourceResult<(Box<dyn Notifier>, NotifierChannels)> {
        let (notifier, channels, _feed) = ManualNotifier::open();
        Ok((Box::new(notifier) as Box<dyn Notifier>, channels))
    }

    #[test]
    fn test_start_requires_listener() {
        let coordinator = WatchCoordinator::new(Arc::new(Shared::new(SourceSettings::default())));
        let err = coordinator.start(None, manual).unwrap_err();
        assert!(matches!(err, SourceError::InvalidArgument { .. }));
        assert_eq!(coordinator.state(), WatchState::Idle);
    }

    #[test]
    fn test_start_only_once() {
        let coordinator = WatchCoordinator::new(Arc::new(Shared::new(SourceSettings::default())));
        // The feed must outlive the assertions or the pump sees a closed channel.
        let (notifier, channels, _feed) = ManualNotifier::open();
        coordinator
            .start(listener(), move || {
                Ok((Box::new(notifier) as Box<dyn Notifier>, channels))
            })
            .unwrap();
        assert_eq!(coordinator.state(), WatchState::Watching);

        let err = coordinator.start(listener(), manual).unwrap_err();
        assert!(matches!(err, SourceError::InvalidArgument { .. }));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let coordinator = WatchCoordinator::new(Arc::new(Shared::new(SourceSettings::default())));
        coordinator.stop();
        assert_eq!(coordinator.state(), WatchState::Stopped);

        coordinator.stop();
        let err = coordinator.start(listener(), manual).unwrap_err();
        assert!(matches!(err, SourceError::InvalidArgument { .. }));
    }

    #[test]
    fn test_open_failure_propagates() {
        let coordinator = WatchCoordinator::new(Arc::new(Shared::new(SourceSettings::default())));
        let err = coordinator
            .start(listener(), || {
                Err(SourceError::NotifierInit {
                    reason: "no inotify instances left".to_string(),
                })
            })
            .unwrap_err();
        assert!(matches!(err, SourceError::NotifierInit { .. }));
        assert_eq!(coordinator.state(), WatchState::Idle);
    }
}
