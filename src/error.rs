//! Error types for the file configuration source.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from source registration, loading, and watching.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("[{}] file not exist", path.display())]
    PathNotFound { path: PathBuf },

    #[error("key '{key}' does not exist")]
    KeyNotFound { key: String },

    #[error("file type of [{}] not supported", path.display())]
    UnsupportedType { path: PathBuf },

    #[error("failed to pull configurations from [{}]: {reason}", path.display())]
    HandlerFailed { path: PathBuf, reason: String },

    #[error("failed to initialize file watcher: {reason}")]
    NotifierInit { reason: String },

    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("cannot watch path {}: {reason}", path.display())]
    Watch { path: PathBuf, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    /// Map an I/O error on `path`, folding `NotFound` into [`SourceError::PathNotFound`].
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            SourceError::PathNotFound { path }
        } else {
            SourceError::Io { path, source }
        }
    }
}

/// Error returned by a [`ContentHandler`](crate::handlers::ContentHandler).
#[derive(Error, Debug)]
#[error("{reason}")]
pub struct HandlerError {
    pub reason: String,
}

impl HandlerError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<toml::de::Error> for HandlerError {
    fn from(e: toml::de::Error) -> Self {
        HandlerError::new(e.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        HandlerError::new(e.to_string())
    }
}

impl From<std::str::Utf8Error> for HandlerError {
    fn from(e: std::str::Utf8Error) -> Self {
        HandlerError::new(format!("content is not valid UTF-8: {e}"))
    }
}

impl From<notify::Error> for SourceError {
    fn from(e: notify::Error) -> Self {
        SourceError::NotifierInit {
            reason: e.to_string(),
        }
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_maps_not_found() {
        let err = SourceError::from_io(
            "/missing/app.conf",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, SourceError::PathNotFound { .. }));
        assert_eq!(err.to_string(), "[/missing/app.conf] file not exist");

        let err = SourceError::from_io(
            "/locked/app.conf",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
