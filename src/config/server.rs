//! Dev server options
//!
//! `hmr` accepts a boolean or an options object, `watchOptions: null`
//! disables file watching, and `middlewareMode` is a boolean in JSON but may
//! carry a caller-owned parent server when built in code.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::hmr::HmrTransport;
use crate::server::HttpServerHandle;

/// Dev server options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerOptions {
    /// Host to bind to (default: "localhost")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 9000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Certificate and key for HTTPS
    #[serde(default)]
    pub https: Option<HttpsConfig>,

    /// HMR configuration, `true`/`false` or an options object
    #[serde(default)]
    pub hmr: HmrSetting,

    /// `false` disables the websocket connection entirely
    #[serde(default = "default_ws")]
    pub ws: bool,

    /// File watcher configuration, `null` disables watching
    #[serde(default = "default_watch_options")]
    pub watch_options: Option<WatchOptions>,

    /// Create the dev server as middleware inside a caller-owned server
    #[serde(default)]
    pub middleware_mode: MiddlewareMode,

    /// Origin used for generated asset URLs and CORS
    #[serde(default)]
    pub origin: Option<String>,

    /// Enable permissive CORS when no origin is configured
    #[serde(default = "default_cors")]
    pub cors: bool,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_ws() -> bool {
    true
}

fn default_cors() -> bool {
    true
}

fn default_watch_options() -> Option<WatchOptions> {
    Some(WatchOptions::default())
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            https: None,
            hmr: HmrSetting::default(),
            ws: default_ws(),
            watch_options: default_watch_options(),
            middleware_mode: MiddlewareMode::default(),
            origin: None,
            cors: default_cors(),
        }
    }
}

impl ServerOptions {
    /// HMR options when `hmr` is an object
    pub fn hmr_options(&self) -> Option<&HmrOptions> {
        match &self.hmr {
            HmrSetting::Options(options) => Some(options),
            HmrSetting::Enabled(_) => None,
        }
    }

    /// Whether middleware mode is on, with or without a parent server
    pub fn is_middleware_mode(&self) -> bool {
        !matches!(self.middleware_mode, MiddlewareMode::Disabled)
    }
}

/// PEM certificate and key paths
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// File watcher options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchOptions {
    /// Regex patterns of paths to ignore
    #[serde(default)]
    pub ignored: Vec<String>,

    /// Use a polling watcher with this interval
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
}

/// `hmr: boolean | HmrOptions`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HmrSetting {
    Enabled(bool),
    Options(HmrOptions),
}

impl Default for HmrSetting {
    fn default() -> Self {
        HmrSetting::Enabled(true)
    }
}

/// HMR channel options
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HmrOptions {
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    /// A port different from the HTTP port gets its own websocket listener
    #[serde(default)]
    pub port: Option<u16>,
    /// Port the browser client connects to, when behind a proxy
    #[serde(default)]
    pub client_port: Option<u16>,
    #[serde(default)]
    pub path: Option<String>,
    /// Client ping timeout in milliseconds
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub overlay: Option<bool>,

    /// Externally supplied listener to attach the channel to
    #[serde(skip)]
    pub server: Option<Arc<HttpServerHandle>>,

    /// Pre-built transports that receive every payload alongside the websocket
    #[serde(skip)]
    pub channels: Vec<Arc<dyn HmrTransport>>,
}

impl fmt::Debug for HmrOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmrOptions")
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_port", &self.client_port)
            .field("path", &self.path)
            .field("timeout", &self.timeout)
            .field("overlay", &self.overlay)
            .field("server", &self.server.is_some())
            .field("channels", &self.channels.len())
            .finish()
    }
}

/// `middlewareMode: boolean | { server }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "bool", into = "bool")]
pub enum MiddlewareMode {
    #[default]
    Disabled,
    Enabled,
    /// Mounted inside this caller-owned server
    Parent(Arc<HttpServerHandle>),
}

impl MiddlewareMode {
    /// The caller-owned server, if one was supplied
    pub fn parent_server(&self) -> Option<&Arc<HttpServerHandle>> {
        match self {
            MiddlewareMode::Parent(server) => Some(server),
            _ => None,
        }
    }
}

impl From<bool> for MiddlewareMode {
    fn from(enabled: bool) -> Self {
        if enabled {
            MiddlewareMode::Enabled
        } else {
            MiddlewareMode::Disabled
        }
    }
}

impl From<MiddlewareMode> for bool {
    fn from(mode: MiddlewareMode) -> Self {
        !matches!(mode, MiddlewareMode::Disabled)
    }
}
