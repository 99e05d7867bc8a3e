//! # Dev Server Configuration
//!
//! Loaded from a JSON file; every field has a default so an empty object is
//! a valid configuration.

mod errors;
mod server;

pub use errors::{ConfigError, ConfigResult};
pub use server::{
    HmrOptions, HmrSetting, HttpsConfig, MiddlewareMode, ServerOptions, WatchOptions,
};

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Resolved dev configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevConfig {
    /// Project root (default: ".")
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Public directory, relative to `root`; `null` disables it
    #[serde(default = "default_public_dir")]
    pub public_dir: Option<PathBuf>,

    /// URL prefix the app is served under (default: "/")
    #[serde(default = "default_public_path")]
    pub public_path: String,

    #[serde(default)]
    pub server: ServerOptions,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_public_dir() -> Option<PathBuf> {
    Some(PathBuf::from("public"))
}

fn default_public_path() -> String {
    "/".to_string()
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            public_dir: default_public_dir(),
            public_path: default_public_path(),
            server: ServerOptions::default(),
        }
    }
}

impl DevConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Parse and validate configuration JSON
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: DevConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host must not be empty".into()));
        }

        if let Some(origin) = &self.server.origin {
            if !(origin.starts_with("http://") || origin.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "server.origin must start with http:// or https://, got '{}'",
                    origin
                )));
            }
        }

        if let Some(path) = self.server.hmr_options().and_then(|h| h.path.as_deref()) {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "server.hmr.path must start with '/', got '{}'",
                    path
                )));
            }
        }

        Ok(())
    }

    /// Absolute-ish public directory, if enabled
    pub fn public_dir_path(&self) -> Option<PathBuf> {
        self.public_dir.as_ref().map(|dir| self.root.join(dir))
    }

    /// Public path with exactly one leading and one trailing `/`
    pub fn normalized_public_path(&self) -> String {
        let trimmed = self.public_path.trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", trimmed)
        }
    }
}
