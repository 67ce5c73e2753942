//! Filesystem watching for live reconciliation.
//!
//! # Architecture
//!
//! ```text
//! Notifier (notify / manual)
//!   - events channel, fatal error channel
//!         |
//! WatchCoordinator pump thread
//!   - filters swap files and removals
//!   - follows renames
//!   - settles creates
//!         |
//! loader::reconcile -> merge -> listener
//! ```

mod coordinator;
mod notifier;

pub(crate) use coordinator::WatchCoordinator;
pub use coordinator::WatchState;
pub use notifier::{
    FsEvent, FsNotifier, FsOp, ManualFeed, ManualNotifier, Notifier, NotifierChannels,
};
