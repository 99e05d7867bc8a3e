//! # Module Graph Errors

use thiserror::Error;

/// Result type for module graph updates
pub type GraphResult<T> = Result<T, GraphError>;

/// Module graph errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Module {0} cannot import itself")]
    SelfImport(String),
}

impl GraphError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            GraphError::UnknownModule(_) => "DEVHOST_GRAPH_UNKNOWN_MODULE",
            GraphError::SelfImport(_) => "DEVHOST_GRAPH_SELF_IMPORT",
        }
    }
}
