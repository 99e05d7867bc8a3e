//! # Compatibility Layer Errors

use thiserror::Error;

use crate::observability::{log_event_with_fields, Event};

/// Result type for plugin-facing façade operations
pub type CompatResult<T> = Result<T, CompatError>;

/// Errors surfaced to foreign plugins
///
/// None of these are retried; a plugin that queries the module graph too
/// early retries after compilation has started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompatError {
    /// A name outside the capability surface was read or written
    #[error(
        "plugin '{plugin}' accessed {capability}.{key} which is not supported; supported: [{}]",
        .allowed.join(", ")
    )]
    IncompatibleCapability {
        plugin: String,
        capability: &'static str,
        allowed: Vec<String>,
        key: String,
    },

    #[error("plugin '{plugin}' queried the module graph before compilation started")]
    ContextNotReady { plugin: String },

    #[error("module graph context for plugin '{plugin}' is already set")]
    ContextAlreadyInjected { plugin: String },

    #[error("build already started; the module graph context is set")]
    BuildAlreadyStarted,

    #[error("plugin name must not be empty")]
    InvalidPluginName,

    #[error("write to {capability}.{key} was not handled")]
    WriteDeclined {
        capability: &'static str,
        key: String,
    },
}

impl CompatError {
    /// Rejection of `key` on a capability surface
    pub fn incompatible(plugin: &str, capability: &'static str, allowed: &[&str], key: &str) -> Self {
        log_event_with_fields(
            Event::CapabilityRejected,
            &[("plugin", plugin), ("capability", capability), ("key", key)],
        );
        CompatError::IncompatibleCapability {
            plugin: plugin.to_string(),
            capability,
            allowed: allowed.iter().map(|name| name.to_string()).collect(),
            key: key.to_string(),
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            CompatError::IncompatibleCapability { .. } => "DEVHOST_INCOMPATIBLE_CAPABILITY",
            CompatError::ContextNotReady { .. } => "DEVHOST_CONTEXT_NOT_READY",
            CompatError::ContextAlreadyInjected { .. } => "DEVHOST_CONTEXT_ALREADY_INJECTED",
            CompatError::BuildAlreadyStarted => "DEVHOST_BUILD_ALREADY_STARTED",
            CompatError::InvalidPluginName => "DEVHOST_INVALID_PLUGIN_NAME",
            CompatError::WriteDeclined { .. } => "DEVHOST_WRITE_DECLINED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incompatible_message() {
        let err = CompatError::incompatible("vite-plugin-x", "viteDevServer", &["ws", "config"], "restart");
        assert_eq!(
            err.to_string(),
            "plugin 'vite-plugin-x' accessed viteDevServer.restart which is not supported; supported: [ws, config]"
        );
        assert_eq!(err.code(), "DEVHOST_INCOMPATIBLE_CAPABILITY");
    }
}
