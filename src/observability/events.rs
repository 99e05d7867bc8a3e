//! Observable events of the dev server host
//!
//! Events are explicit and typed; the logger only ever sees `as_str()`.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Bootstrap
    /// Dev server bootstrap begins
    BootStart,
    /// Dev server assembled
    BootComplete,
    /// HTTPS options resolved from cert/key files
    HttpsResolved,
    /// No listener created, host is mounted by the caller
    MiddlewareMode,
    /// Public directory scanned
    PublicFilesScanned,

    // Listener
    /// HTTP(S) listener bound
    HttpListening,
    /// HTTP(S) connection failed
    HttpConnectionFailed,
    /// Listener shut down
    HttpClosed,

    // HMR
    /// HMR channel created on a listener
    HmrChannelCreated,
    /// HMR channel disabled by `ws: false`
    HmrChannelDisabled,
    /// HMR client connected
    HmrClientConnected,
    /// HMR client disconnected
    HmrClientDisconnected,
    /// HMR client sent an unreadable frame
    HmrInvalidMessage,

    // Watcher
    /// File watcher started
    WatcherStarted,
    /// File watching disabled by `watchOptions: null`
    WatcherDisabled,
    /// File watcher reported an error
    WatcherError,

    // Compatibility layer
    /// Plugin attached and given a façade
    PluginAttached,
    /// Plugin touched a name outside the capability surface
    CapabilityRejected,
    /// Plugin replaced `printUrls` on the host
    PrintUrlsRebound,
    /// Module graph context injected into plugin adapters
    ModuleContextInjected,

    /// Resolved server URLs
    ServerUrls,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "DEV_SERVER_BOOT_BEGIN",
            Event::BootComplete => "DEV_SERVER_BOOT_COMPLETE",
            Event::HttpsResolved => "HTTPS_RESOLVED",
            Event::MiddlewareMode => "MIDDLEWARE_MODE",
            Event::PublicFilesScanned => "PUBLIC_FILES_SCANNED",

            Event::HttpListening => "HTTP_LISTENING",
            Event::HttpConnectionFailed => "HTTP_CONNECTION_FAILED",
            Event::HttpClosed => "HTTP_CLOSED",

            Event::HmrChannelCreated => "HMR_CHANNEL_CREATED",
            Event::HmrChannelDisabled => "HMR_CHANNEL_DISABLED",
            Event::HmrClientConnected => "HMR_CLIENT_CONNECTED",
            Event::HmrClientDisconnected => "HMR_CLIENT_DISCONNECTED",
            Event::HmrInvalidMessage => "HMR_INVALID_MESSAGE",

            Event::WatcherStarted => "WATCHER_STARTED",
            Event::WatcherDisabled => "WATCHER_DISABLED",
            Event::WatcherError => "WATCHER_ERROR",

            Event::PluginAttached => "PLUGIN_ATTACHED",
            Event::CapabilityRejected => "CAPABILITY_REJECTED",
            Event::PrintUrlsRebound => "PRINT_URLS_REBOUND",
            Event::ModuleContextInjected => "MODULE_CONTEXT_INJECTED",

            Event::ServerUrls => "SERVER_URLS",
        }
    }

    /// Events that describe something going wrong
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::CapabilityRejected
                | Event::HmrInvalidMessage
                | Event::HttpConnectionFailed
                | Event::WatcherError
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
