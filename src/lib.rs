//! Live configuration from files and directory trees.
//!
//! Files are parsed into flat key/value mappings, merged by priority (lower
//! value wins), and watched on disk. Every create, update, and delete of a
//! merged key is reported to an attached listener.

pub mod config;
pub mod error;
pub mod handlers;
pub mod loader;
pub mod logging;
pub mod merge;
pub mod registry;
pub mod source;
mod state;
pub mod types;
pub mod watcher;

pub use config::{LoggingConfig, SourceSettings};
pub use error::{HandlerError, SourceError, SourceResult};
pub use handlers::{
    ContentHandler, JsonHandler, PropertiesHandler, SharedHandler, TomlHandler,
    handler_for_extension,
};
pub use merge::{Store, merge};
pub use registry::{HandlerRegistry, SourceRegistry};
pub use source::{ConfigSource, FileSource};
pub use state::{ConfigListener, SharedListener};
pub use types::{ChangeEvent, ConfigEntry, ConfigMap, EventKind, SOURCE_NAME, Source};
pub use watcher::{FsEvent, FsNotifier, FsOp, ManualFeed, ManualNotifier, Notifier, NotifierChannels, WatchState};
