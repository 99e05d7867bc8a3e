//! # Dev Server Errors

use thiserror::Error;

use crate::hmr::HmrError;
use crate::watcher::WatcherError;

/// Result type for dev server bootstrap and lifecycle
pub type ServerResult<T> = Result<T, ServerError>;

/// Dev server errors
#[derive(Debug, Error)]
pub enum ServerError {
    /// A websocket channel cannot attach to a server that does not exist
    #[error("Websocket requires a server: no HTTP(S) listener available for the HMR channel")]
    ServerUnavailable,

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hmr(#[from] HmrError),

    #[error(transparent)]
    Watcher(#[from] WatcherError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::ServerUnavailable => "DEVHOST_SERVER_UNAVAILABLE",
            ServerError::Tls(_) => "DEVHOST_TLS",
            ServerError::Bind { .. } => "DEVHOST_BIND",
            ServerError::Io(_) => "DEVHOST_IO",
            ServerError::Hmr(_) => "DEVHOST_HMR",
            ServerError::Watcher(_) => "DEVHOST_WATCHER",
            ServerError::Internal(_) => "DEVHOST_INTERNAL",
        }
    }
}
