//! Filesystem change notifiers.
//!
//! A notifier delivers [`FsEvent`]s on one channel and fatal errors on a
//! second one, and lets the coordinator add and remove individual watch
//! targets. [`FsNotifier`] wraps `notify::RecommendedWatcher`;
//! [`ManualNotifier`] is fed by hand through a [`ManualFeed`], for hosts that
//! already have their own change source.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use indexmap::IndexSet;
use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;

use crate::error::{SourceError, SourceResult};

/// Raw filesystem operation reported for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    Create,
    Write,
    Remove,
    Rename,
}

/// One raw notification for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub path: PathBuf,
    pub op: FsOp,
}

impl FsEvent {
    pub fn new(path: impl Into<PathBuf>, op: FsOp) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }
}

/// Receiving ends of a notifier: change events and fatal errors.
pub struct NotifierChannels {
    pub events: Receiver<FsEvent>,
    pub errors: Receiver<String>,
}

/// Watch-target management for an opened notifier.
pub trait Notifier: Send {
    /// Start delivering events for `path`.
    fn watch(&mut self, path: &Path) -> SourceResult<()>;

    /// Stop delivering events for `path`.
    fn unwatch(&mut self, path: &Path) -> SourceResult<()>;
}

/// Notifier backed by the platform's recommended `notify` watcher.
pub struct FsNotifier {
    watcher: RecommendedWatcher,
}

impl FsNotifier {
    /// Create the underlying watcher and its channels.
    ///
    /// # Errors
    /// Returns [`SourceError::NotifierInit`] if the platform watcher cannot start.
    pub fn open() -> SourceResult<(Self, NotifierChannels)> {
        let (event_tx, event_rx) = unbounded();
        let (error_tx, error_rx) = unbounded();

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let Some(op) = classify(&event.kind) else {
                    return;
                };
                for path in event.paths {
                    let _ = event_tx.send(FsEvent { path, op });
                }
            }
            Err(e) => {
                let _ = error_tx.send(e.to_string());
            }
        })?;

        Ok((
            Self { watcher },
            NotifierChannels {
                events: event_rx,
                errors: error_rx,
            },
        ))
    }
}

impl Notifier for FsNotifier {
    fn watch(&mut self, path: &Path) -> SourceResult<()> {
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| SourceError::Watch {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn unwatch(&mut self, path: &Path) -> SourceResult<()> {
        self.watcher.unwatch(path).map_err(|e| SourceError::Watch {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Map a `notify` event kind onto the four operations the coordinator knows.
fn classify(kind: &EventKind) -> Option<FsOp> {
    match kind {
        EventKind::Create(_) => Some(FsOp::Create),
        EventKind::Modify(ModifyKind::Name(_)) => Some(FsOp::Rename),
        EventKind::Modify(_) => Some(FsOp::Write),
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => Some(FsOp::Write),
        EventKind::Remove(_) => Some(FsOp::Remove),
        _ => None,
    }
}

/// Notifier driven through a [`ManualFeed`].
///
/// The channels close once every [`ManualFeed`] clone is dropped.
pub struct ManualNotifier {
    watched: Arc<Mutex<IndexSet<PathBuf>>>,
}

/// Sending side of a [`ManualNotifier`].
#[derive(Clone)]
pub struct ManualFeed {
    events: Sender<FsEvent>,
    errors: Sender<String>,
    watched: Arc<Mutex<IndexSet<PathBuf>>>,
}

impl ManualNotifier {
    /// Create a notifier, its channels, and the feed that drives it.
    pub fn open() -> (Self, NotifierChannels, ManualFeed) {
        let (event_tx, event_rx) = unbounded();
        let (error_tx, error_rx) = unbounded();
        let watched = Arc::new(Mutex::new(IndexSet::new()));

        let notifier = Self {
            watched: watched.clone(),
        };
        let feed = ManualFeed {
            events: event_tx,
            errors: error_tx,
            watched,
        };

        (
            notifier,
            NotifierChannels {
                events: event_rx,
                errors: error_rx,
            },
            feed,
        )
    }
}

impl Notifier for ManualNotifier {
    fn watch(&mut self, path: &Path) -> SourceResult<()> {
        self.watched.lock().insert(path.to_path_buf());
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> SourceResult<()> {
        self.watched.lock().shift_remove(path);
        Ok(())
    }
}

impl ManualFeed {
    /// Deliver an event. Returns `false` once the pump is gone.
    pub fn send(&self, path: impl Into<PathBuf>, op: FsOp) -> bool {
        self.events.send(FsEvent::new(path, op)).is_ok()
    }

    /// Deliver a fatal notifier error.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.errors.send(reason.into()).is_ok()
    }

    /// Paths currently watched, in the order they were added.
    pub fn watched(&self) -> Vec<PathBuf> {
        self.watched.lock().iter().cloned().collect()
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.watched.lock().contains(path)
    }
}
