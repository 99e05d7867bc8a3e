//! # HMR Errors

use thiserror::Error;

/// Result type for HMR channel operations
pub type HmrResult<T> = Result<T, HmrError>;

/// HMR channel errors
#[derive(Debug, Clone, Error)]
pub enum HmrError {
    #[error("Failed to bind HMR port {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),

    #[error("Failed to serialize HMR payload: {0}")]
    Serialize(String),

    #[error("HMR channel closed")]
    Closed,
}

impl HmrError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            HmrError::Bind { .. } => "DEVHOST_HMR_BIND",
            HmrError::Handshake(_) => "DEVHOST_HMR_HANDSHAKE",
            HmrError::Serialize(_) => "DEVHOST_HMR_SERIALIZE",
            HmrError::Closed => "DEVHOST_HMR_CLOSED",
        }
    }
}

impl From<serde_json::Error> for HmrError {
    fn from(e: serde_json::Error) -> Self {
        HmrError::Serialize(e.to_string())
    }
}
