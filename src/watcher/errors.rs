//! # Watcher Errors

use std::path::PathBuf;

use thiserror::Error;

/// Result type for file watcher operations
pub type WatcherResult<T> = Result<T, WatcherError>;

/// File watcher errors
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Failed to create file watcher: {0}")]
    Create(#[source] notify::Error),

    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl WatcherError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            WatcherError::Create(_) => "DEVHOST_WATCHER_CREATE",
            WatcherError::Watch { .. } => "DEVHOST_WATCHER_WATCH",
            WatcherError::InvalidPattern { .. } => "DEVHOST_WATCHER_PATTERN",
        }
    }
}
