//! Resolved server URLs and the `printUrls` callback

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use super::instance::InternalDevServer;
use crate::observability::{log_event_with_fields, Event};

/// URLs the dev server is reachable at
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedUrls {
    pub local: Vec<String>,
    pub network: Vec<String>,
}

/// Compute the URLs for a bound listener
///
/// Wildcard and loopback hosts print as `localhost`; a wildcard host has no
/// network URLs since interfaces are not enumerated.
pub fn resolve_server_urls(host: &str, addr: SocketAddr, https: bool, public_path: &str) -> ResolvedUrls {
    let scheme = if https { "https" } else { "http" };
    let port = addr.port();
    let url = |h: &str| format!("{}://{}:{}{}", scheme, h, port, public_path);

    match host.parse::<IpAddr>() {
        Ok(ip) if ip.is_unspecified() || ip.is_loopback() => ResolvedUrls {
            local: vec![url("localhost")],
            network: Vec::new(),
        },
        Ok(IpAddr::V6(ip)) => ResolvedUrls {
            local: Vec::new(),
            network: vec![url(&format!("[{}]", ip))],
        },
        Ok(ip) => ResolvedUrls {
            local: Vec::new(),
            network: vec![url(&ip.to_string())],
        },
        Err(_) if host == "localhost" => ResolvedUrls {
            local: vec![url("localhost")],
            network: Vec::new(),
        },
        Err(_) => ResolvedUrls {
            local: Vec::new(),
            network: vec![url(host)],
        },
    }
}

/// A plugin-supplied `printUrls` replacement
///
/// Receives the real server explicitly, never a façade.
#[derive(Clone)]
pub struct PrintUrlsHook(Arc<dyn Fn(&InternalDevServer) + Send + Sync>);

impl PrintUrlsHook {
    pub fn new(f: impl Fn(&InternalDevServer) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &PrintUrlsHook) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn call(&self, server: &InternalDevServer) {
        (self.0)(server)
    }
}

impl fmt::Debug for PrintUrlsHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrintUrlsHook(..)")
    }
}

/// The live `printUrls` callback, already bound to a server
#[derive(Clone)]
pub struct PrintUrls(Arc<dyn Fn() + Send + Sync>);

impl PrintUrls {
    /// Bind `hook` to `server`
    ///
    /// Holds the server weakly: the server stores this callback, so a strong
    /// reference would keep it alive forever. Calling after the server is
    /// gone does nothing.
    pub fn bind(server: Weak<InternalDevServer>, hook: PrintUrlsHook) -> Self {
        Self(Arc::new(move || {
            if let Some(server) = server.upgrade() {
                hook.call(&server);
            }
        }))
    }

    /// The host's own printer: logs the resolved URLs
    pub fn host_default(server: Weak<InternalDevServer>) -> Self {
        Self::bind(server, PrintUrlsHook::new(print_server_urls))
    }

    pub fn call(&self) {
        (self.0)()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &PrintUrls) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for PrintUrls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrintUrls(..)")
    }
}

fn print_server_urls(server: &InternalDevServer) {
    let Some(urls) = server.resolved_urls() else {
        return;
    };
    for url in &urls.local {
        log_event_with_fields(Event::ServerUrls, &[("kind", "local"), ("url", url)]);
    }
    for url in &urls.network {
        log_event_with_fields(Event::ServerUrls, &[("kind", "network"), ("url", url)]);
    }
}
