//! The host's internal dev server
//!
//! Long-lived and `Arc`-shared by every plugin façade. Slots the host fills
//! after construction (HMR channel, resolved URLs, `printUrls`) sit behind
//! locks so façades created earlier observe them.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::errors::ServerResult;
use super::http::HttpServerHandle;
use super::middleware::MiddlewareStack;
use super::urls::{resolve_server_urls, PrintUrls, ResolvedUrls};
use crate::config::{DevConfig, ServerOptions};
use crate::hmr::{HmrChannel, HmrPayload, HmrTransport, Update, UpdateKind};
use crate::module_graph::ModuleType;
use crate::watcher::{FileWatcher, WatchEvent, WatchEventKind};

/// The real dev server instance
pub struct InternalDevServer {
    config: Arc<DevConfig>,
    server_options: Arc<ServerOptions>,
    http_server: Option<Arc<HttpServerHandle>>,
    middlewares: MiddlewareStack,
    watcher: Arc<FileWatcher>,
    ws: RwLock<Option<Arc<HmrChannel>>>,
    resolved_urls: RwLock<Option<Arc<ResolvedUrls>>>,
    print_urls: RwLock<Option<PrintUrls>>,
}

impl InternalDevServer {
    /// Assemble a server; the HMR channel is attached separately
    pub fn new(
        config: Arc<DevConfig>,
        http_server: Option<Arc<HttpServerHandle>>,
        middlewares: MiddlewareStack,
        watcher: Arc<FileWatcher>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            server_options: Arc::new(config.server.clone()),
            config,
            http_server,
            middlewares,
            watcher,
            ws: RwLock::new(None),
            resolved_urls: RwLock::new(None),
            print_urls: RwLock::new(Some(PrintUrls::host_default(weak.clone()))),
        })
    }

    pub fn config(&self) -> &Arc<DevConfig> {
        &self.config
    }

    pub fn server_options(&self) -> &Arc<ServerOptions> {
        &self.server_options
    }

    /// Absent in middleware mode
    pub fn http_server(&self) -> Option<&Arc<HttpServerHandle>> {
        self.http_server.as_ref()
    }

    pub fn middlewares(&self) -> &MiddlewareStack {
        &self.middlewares
    }

    pub fn watcher(&self) -> &Arc<FileWatcher> {
        &self.watcher
    }

    /// HMR channel, once the host has created it
    pub fn ws(&self) -> Option<Arc<HmrChannel>> {
        self.ws.read().ok().and_then(|ws| ws.clone())
    }

    pub fn set_ws(&self, channel: Arc<HmrChannel>) {
        if let Ok(mut ws) = self.ws.write() {
            *ws = Some(channel);
        }
    }

    /// Resolved URLs, once listening
    pub fn resolved_urls(&self) -> Option<Arc<ResolvedUrls>> {
        self.resolved_urls.read().ok().and_then(|urls| urls.clone())
    }

    pub fn set_resolved_urls(&self, urls: ResolvedUrls) {
        if let Ok(mut slot) = self.resolved_urls.write() {
            *slot = Some(Arc::new(urls));
        }
    }

    /// The live `printUrls` callback
    pub fn print_urls(&self) -> Option<PrintUrls> {
        self.print_urls.read().ok().and_then(|p| p.clone())
    }

    /// Replace the live `printUrls` callback for every façade on this server
    pub fn set_print_urls(&self, print_urls: PrintUrls) {
        if let Ok(mut slot) = self.print_urls.write() {
            *slot = Some(print_urls);
        }
    }

    /// Bind the listener, start HMR, resolve URLs and print them
    pub async fn listen(&self) -> ServerResult<()> {
        if let Some(http) = &self.http_server {
            let addr = http.listen().await?;
            let urls = resolve_server_urls(
                http.host(),
                addr,
                http.is_https(),
                &self.config.normalized_public_path(),
            );
            self.set_resolved_urls(urls);
        }

        if let Some(ws) = self.ws() {
            ws.listen().await?;
        }

        if let Some(print_urls) = self.print_urls() {
            print_urls.call();
        }
        Ok(())
    }

    /// Push watcher changes to HMR clients
    ///
    /// Stylesheet edits become `css-update`s, everything else a full
    /// reload. The task ends once the server is dropped.
    pub fn spawn_watch_reloads(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.watcher.subscribe();
        let root = std::fs::canonicalize(&self.config.root)
            .unwrap_or_else(|_| self.config.root.clone());
        let server = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                };
                let Some(server) = server.upgrade() else {
                    break;
                };
                if let Some(ws) = server.ws() {
                    ws.send(&reload_payload(&root, &event));
                }
            }
        })
    }

    /// Stop watcher, HMR channel and listener
    pub async fn close(&self) -> ServerResult<()> {
        self.watcher.close();
        if let Some(ws) = self.ws() {
            ws.close().await?;
        }
        if let Some(http) = &self.http_server {
            http.close();
        }
        Ok(())
    }
}

fn reload_payload(root: &Path, event: &WatchEvent) -> HmrPayload {
    let url = match event.path.strip_prefix(root) {
        Ok(relative) => format!("/{}", relative.to_string_lossy().replace('\\', "/")),
        Err(_) => event.path.to_string_lossy().into_owned(),
    };

    match (event.kind, ModuleType::from_path(&url)) {
        (WatchEventKind::Change, ModuleType::Css) => HmrPayload::Update {
            updates: vec![Update::now(UpdateKind::CssUpdate, url)],
        },
        _ => HmrPayload::FullReload { path: Some(url) },
    }
}

impl fmt::Debug for InternalDevServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalDevServer")
            .field("http_server", &self.http_server)
            .field("middlewares", &self.middlewares)
            .field("ws", &self.ws().map(|ws| ws.name().to_string()))
            .field("resolved_urls", &self.resolved_urls())
            .finish()
    }
}
