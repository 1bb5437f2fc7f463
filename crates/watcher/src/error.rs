//! Typed errors for the watcher pipeline
//!
//! Configuration and lifecycle misuse comes back synchronously from the
//! offending call. Runtime failures from the raw event source travel through
//! the error handler (or the log) instead.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed cause carried by source-level failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for watcher operations
pub type Result<T, E = WatchError> = std::result::Result<T, E>;

/// Errors produced by the watcher
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watcher is stopped")]
    WatcherStopped,

    #[error("watcher is running")]
    WatcherRunning,

    #[error("invalid path: {path:?}")]
    InvalidPath { path: PathBuf },

    #[error("path not found: {}", path.display())]
    PathNotFound { path: PathBuf },

    #[error("not a directory: {}", path.display())]
    NotDirectory { path: PathBuf },

    #[error("already watching: {}", path.display())]
    AlreadyWatching { path: PathBuf },

    #[error("not watching: {}", path.display())]
    NotWatching { path: PathBuf },

    #[error("no handler configured")]
    NoHandler,

    #[error("event buffer full ({capacity} slots), dropped event for {}", path.display())]
    BufferOverflow { capacity: usize, path: PathBuf },

    #[error("invalid filter pattern {pattern:?}: {message}")]
    InvalidFilter { pattern: String, message: String },

    #[error("event source error: {message}")]
    Source {
        message: String,
        #[source]
        cause: Option<BoxError>,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Kind of a [`WatchError`], for identity matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    WatcherStopped,
    WatcherRunning,
    InvalidPath,
    PathNotFound,
    NotDirectory,
    AlreadyWatching,
    NotWatching,
    NoHandler,
    BufferOverflow,
    InvalidFilter,
    Source,
    Io,
}

impl ErrorKind {
    /// Stable machine-readable code
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::WatcherStopped => "WATCHER_STOPPED",
            ErrorKind::WatcherRunning => "WATCHER_RUNNING",
            ErrorKind::InvalidPath => "INVALID_PATH",
            ErrorKind::PathNotFound => "PATH_NOT_FOUND",
            ErrorKind::NotDirectory => "NOT_DIRECTORY",
            ErrorKind::AlreadyWatching => "ALREADY_WATCHING",
            ErrorKind::NotWatching => "NOT_WATCHING",
            ErrorKind::NoHandler => "NO_HANDLER",
            ErrorKind::BufferOverflow => "BUFFER_OVERFLOW",
            ErrorKind::InvalidFilter => "INVALID_FILTER",
            ErrorKind::Source => "SOURCE_ERROR",
            ErrorKind::Io => "IO_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl WatchError {
    /// Kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            WatchError::WatcherStopped => ErrorKind::WatcherStopped,
            WatchError::WatcherRunning => ErrorKind::WatcherRunning,
            WatchError::InvalidPath { .. } => ErrorKind::InvalidPath,
            WatchError::PathNotFound { .. } => ErrorKind::PathNotFound,
            WatchError::NotDirectory { .. } => ErrorKind::NotDirectory,
            WatchError::AlreadyWatching { .. } => ErrorKind::AlreadyWatching,
            WatchError::NotWatching { .. } => ErrorKind::NotWatching,
            WatchError::NoHandler => ErrorKind::NoHandler,
            WatchError::BufferOverflow { .. } => ErrorKind::BufferOverflow,
            WatchError::InvalidFilter { .. } => ErrorKind::InvalidFilter,
            WatchError::Source { .. } => ErrorKind::Source,
            WatchError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Check whether this error is of the given kind
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == kind
    }

    /// Build a source error from any error value
    pub fn source_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        WatchError::Source {
            message: err.to_string(),
            cause: Some(Box::new(err)),
        }
    }
}

impl From<notify::Error> for WatchError {
    fn from(err: notify::Error) -> Self {
        WatchError::source_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_kind_and_code() {
        let err = WatchError::AlreadyWatching { path: PathBuf::from("/tmp/a") };
        assert_eq!(err.kind(), ErrorKind::AlreadyWatching);
        assert_eq!(err.code(), "ALREADY_WATCHING");
        assert!(err.is(ErrorKind::AlreadyWatching));
        assert!(!err.is(ErrorKind::NotWatching));
        assert_eq!(err.to_string(), "already watching: /tmp/a");
    }

    #[test]
    fn test_source_error_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "inotify limit reached");
        let err = WatchError::source_error(io);
        assert_eq!(err.kind(), ErrorKind::Source);
        assert!(err.to_string().contains("inotify limit reached"));
        assert!(err.source().is_some());
    }
}
