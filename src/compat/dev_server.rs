//! Dev server façade
//!
//! A per-plugin view over the shared `InternalDevServer`. Reads forward to
//! the live server fields; nothing is copied at construction, so slots the
//! host fills later (the HMR channel, resolved URLs) show through. Writes go
//! through the dispatch table in `dispatch`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::dispatch;
use super::errors::{CompatError, CompatResult};
use super::module_graph::ModuleGraphAdapter;
use super::policy::{CapabilitySurface, DevServerProperty};
use crate::config::{DevConfig, ServerOptions};
use crate::hmr::HmrChannel;
use crate::observability::{log_event_with_fields, Event};
use crate::server::{
    HttpServerHandle, InternalDevServer, MiddlewareStack, PrintUrls, PrintUrlsHook, ResolvedUrls,
};
use crate::watcher::FileWatcher;

/// A value read from or written to the façade
#[derive(Clone)]
pub enum CapabilityValue {
    ServerOptions(Arc<ServerOptions>),
    ResolvedUrls(Option<Arc<ResolvedUrls>>),
    PrintUrls(Option<PrintUrls>),
    /// A plugin's `printUrls` replacement, before binding
    PrintUrlsHook(PrintUrlsHook),
    ModuleGraph(Arc<ModuleGraphAdapter>),
    Config(Arc<DevConfig>),
    Watcher(Arc<FileWatcher>),
    Middlewares(MiddlewareStack),
    Ws(Option<Arc<HmrChannel>>),
    HttpServer(Option<Arc<HttpServerHandle>>),
    /// Arbitrary plugin data
    Json(Value),
}

fn same_arc<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl CapabilityValue {
    /// Identity comparison for shared values, equality for plain data
    pub fn same_as(&self, other: &CapabilityValue) -> bool {
        use CapabilityValue::*;

        match (self, other) {
            (ServerOptions(a), ServerOptions(b)) => Arc::ptr_eq(a, b),
            (ResolvedUrls(a), ResolvedUrls(b)) => same_arc(a, b),
            (PrintUrls(Some(a)), PrintUrls(Some(b))) => a.ptr_eq(b),
            (PrintUrls(None), PrintUrls(None)) => true,
            (PrintUrlsHook(a), PrintUrlsHook(b)) => a.ptr_eq(b),
            (ModuleGraph(a), ModuleGraph(b)) => Arc::ptr_eq(a, b),
            (Config(a), Config(b)) => Arc::ptr_eq(a, b),
            (Watcher(a), Watcher(b)) => Arc::ptr_eq(a, b),
            (Middlewares(a), Middlewares(b)) => a.ptr_eq(b),
            (Ws(a), Ws(b)) => same_arc(a, b),
            (HttpServer(a), HttpServer(b)) => same_arc(a, b),
            (Json(a), Json(b)) => a == b,
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CapabilityValue::ServerOptions(_) => "serverOptions",
            CapabilityValue::ResolvedUrls(_) => "resolvedUrls",
            CapabilityValue::PrintUrls(_) => "printUrls",
            CapabilityValue::PrintUrlsHook(_) => "printUrlsHook",
            CapabilityValue::ModuleGraph(_) => "moduleGraph",
            CapabilityValue::Config(_) => "config",
            CapabilityValue::Watcher(_) => "watcher",
            CapabilityValue::Middlewares(_) => "middlewares",
            CapabilityValue::Ws(_) => "ws",
            CapabilityValue::HttpServer(_) => "httpServer",
            CapabilityValue::Json(_) => "json",
        }
    }
}

impl fmt::Debug for CapabilityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityValue::Json(value) => write!(f, "Json({})", value),
            other => write!(f, "{}(..)", other.kind()),
        }
    }
}

/// Plugin-facing view over the dev server
pub struct DevServerFacade {
    plugin_name: String,
    config: Arc<DevConfig>,
    server: Arc<InternalDevServer>,
    module_graph: Arc<ModuleGraphAdapter>,
    /// Values written through the default handler, visible to this façade only
    shadow: HashMap<String, CapabilityValue>,
}

impl DevServerFacade {
    /// Attach `plugin_name` to `server`
    pub fn new(
        plugin_name: impl Into<String>,
        config: Arc<DevConfig>,
        server: Arc<InternalDevServer>,
    ) -> CompatResult<Self> {
        let plugin_name = plugin_name.into();
        if plugin_name.trim().is_empty() {
            return Err(CompatError::InvalidPluginName);
        }

        log_event_with_fields(Event::PluginAttached, &[("plugin", &plugin_name)]);
        Ok(Self {
            module_graph: Arc::new(ModuleGraphAdapter::new(&plugin_name)),
            plugin_name,
            config,
            server,
            shadow: HashMap::new(),
        })
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn server_options(&self) -> Arc<ServerOptions> {
        Arc::clone(self.server.server_options())
    }

    pub fn resolved_urls(&self) -> Option<Arc<ResolvedUrls>> {
        self.server.resolved_urls()
    }

    /// The server's live callback, shared by every façade
    pub fn print_urls(&self) -> Option<PrintUrls> {
        self.server.print_urls()
    }

    pub fn module_graph(&self) -> &Arc<ModuleGraphAdapter> {
        &self.module_graph
    }

    pub fn config(&self) -> &Arc<DevConfig> {
        &self.config
    }

    pub fn watcher(&self) -> &Arc<FileWatcher> {
        self.server.watcher()
    }

    pub fn middlewares(&self) -> &MiddlewareStack {
        self.server.middlewares()
    }

    pub fn ws(&self) -> Option<Arc<HmrChannel>> {
        self.server.ws()
    }

    /// Absent in middleware mode
    pub fn http_server(&self) -> Option<&Arc<HttpServerHandle>> {
        self.server.http_server()
    }

    fn live(&self, property: DevServerProperty) -> CapabilityValue {
        match property {
            DevServerProperty::ServerOptions => CapabilityValue::ServerOptions(self.server_options()),
            DevServerProperty::ResolvedUrls => CapabilityValue::ResolvedUrls(self.resolved_urls()),
            DevServerProperty::PrintUrls => CapabilityValue::PrintUrls(self.print_urls()),
            DevServerProperty::ModuleGraph => {
                CapabilityValue::ModuleGraph(Arc::clone(&self.module_graph))
            }
            DevServerProperty::Config => CapabilityValue::Config(Arc::clone(&self.config)),
            DevServerProperty::Watcher => CapabilityValue::Watcher(Arc::clone(self.watcher())),
            DevServerProperty::Middlewares => CapabilityValue::Middlewares(self.middlewares().clone()),
            DevServerProperty::Ws => CapabilityValue::Ws(self.ws()),
            DevServerProperty::HttpServer => CapabilityValue::HttpServer(self.http_server().cloned()),
        }
    }

    /// Read a property by its foreign name
    ///
    /// A value this façade wrote through the default handler wins over the
    /// live field.
    pub fn get(&self, name: &str) -> CompatResult<CapabilityValue> {
        let property = DevServerProperty::resolve(&self.plugin_name, name)?;
        if let Some(value) = self.shadow.get(name) {
            return Ok(value.clone());
        }
        Ok(self.live(property))
    }

    /// Write a property by its foreign name
    pub fn set(&mut self, name: &str, value: CapabilityValue) -> CompatResult<()> {
        let handler = dispatch::handler_for(DevServerProperty::from_name(name));
        let server = Arc::clone(&self.server);
        if handler(self, name, value, &server) {
            Ok(())
        } else {
            Err(CompatError::WriteDeclined {
                capability: DevServerProperty::CAPABILITY,
                key: name.to_string(),
            })
        }
    }

    /// Replace the server's `printUrls` with `hook`
    pub fn set_print_urls(&mut self, hook: PrintUrlsHook) -> CompatResult<()> {
        self.set(
            DevServerProperty::PrintUrls.as_str(),
            CapabilityValue::PrintUrlsHook(hook),
        )
    }

    pub(crate) fn store_shadow(&mut self, name: &str, value: CapabilityValue) {
        self.shadow.insert(name.to_string(), value);
    }

    pub(crate) fn clear_shadow(&mut self, name: &str) {
        self.shadow.remove(name);
    }
}

impl fmt::Debug for DevServerFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevServerFacade")
            .field("plugin_name", &self.plugin_name)
            .field("server", &self.server)
            .field("shadowed", &self.shadow.keys().collect::<Vec<_>>())
            .finish()
    }
}
