//! Dev server bootstrap
//!
//! Order: public-file scan starts → HTTPS resolved → middleware stack →
//! listener (unless middleware mode) → public files installed → HMR
//! channel. The result is the `InternalDevServer` plugin façades wrap.

use std::sync::Arc;

use super::errors::{ServerError, ServerResult};
use super::http::{resolve_http_server, resolve_https_config, HttpServerHandle, HttpsOptions};
use super::instance::InternalDevServer;
use super::middleware::MiddlewareStack;
use super::public_dir::{init_public_files, PublicFilesMiddleware};
use crate::config::DevConfig;
use crate::hmr::{DisabledChannel, HmrChannel, WsConfig, WsServer};
use crate::observability::{log_event, log_event_with_fields, Event};
use crate::watcher::FileWatcher;

/// Default HMR websocket path under the public path
pub const DEFAULT_HMR_PATH: &str = "/__hmr";

/// Assembles an `InternalDevServer` from configuration
pub struct DevServer {
    config: Arc<DevConfig>,
    public_path: String,
    https: Option<HttpsOptions>,
    middlewares: MiddlewareStack,
    http_server: Option<Arc<HttpServerHandle>>,
}

impl DevServer {
    pub fn new(config: DevConfig) -> Self {
        let public_path = config.normalized_public_path();
        Self {
            config: Arc::new(config),
            public_path,
            https: None,
            middlewares: MiddlewareStack::new(),
            http_server: None,
        }
    }

    pub fn config(&self) -> &Arc<DevConfig> {
        &self.config
    }

    /// The listener created by `create_server`, absent in middleware mode
    pub fn http_server(&self) -> Option<&Arc<HttpServerHandle>> {
        self.http_server.as_ref()
    }

    /// Build the server instance
    pub async fn create_server(mut self) -> ServerResult<Arc<InternalDevServer>> {
        log_event_with_fields(
            Event::BootStart,
            &[("root", &self.config.root.display().to_string())],
        );

        let public_files_config = Arc::clone(&self.config);
        let public_files =
            tokio::spawn(async move { init_public_files(&public_files_config).await });

        let server_options = &self.config.server;
        self.https = resolve_https_config(server_options.https.as_ref()).await?;

        self.http_server = if server_options.is_middleware_mode() {
            log_event(Event::MiddlewareMode);
            None
        } else {
            Some(resolve_http_server(
                server_options,
                self.middlewares.clone(),
                self.https.clone(),
            ))
        };

        let public_files = public_files
            .await
            .map_err(|e| ServerError::Internal(format!("public dir scan failed: {}", e)))??;
        if !public_files.is_empty() {
            self.middlewares
                .use_middleware(PublicFilesMiddleware::new(public_files, self.public_path.clone()));
        }

        let watcher = match &server_options.watch_options {
            Some(options) => FileWatcher::new(&self.config.root, options)?,
            None => FileWatcher::disabled(),
        };

        let channel = self.create_hmr_channel()?;

        let server = InternalDevServer::new(
            Arc::clone(&self.config),
            self.http_server.clone(),
            self.middlewares.clone(),
            Arc::new(watcher),
        );
        server.set_ws(Arc::new(channel));

        log_event(Event::BootComplete);
        Ok(server)
    }

    /// Create the HMR channel
    ///
    /// `ws: false` yields the inert stand-in. Otherwise the channel needs a
    /// listener: `hmr.server`, then the middleware-mode parent server, then
    /// the dev server's own listener.
    pub fn create_hmr_channel(&self) -> ServerResult<HmrChannel> {
        let options = &self.config.server;
        if !options.ws {
            log_event(Event::HmrChannelDisabled);
            return Ok(HmrChannel::Disabled(DisabledChannel));
        }

        let hmr = options.hmr_options();
        let listener = hmr
            .and_then(|h| h.server.clone())
            .or_else(|| options.middleware_mode.parent_server().cloned())
            .or_else(|| self.http_server.clone())
            .ok_or(ServerError::ServerUnavailable)?;

        let hmr_path = hmr
            .and_then(|h| h.path.as_deref())
            .unwrap_or(DEFAULT_HMR_PATH);
        let path = format!(
            "{}{}",
            self.public_path.trim_end_matches('/'),
            hmr_path
        );

        let config = WsConfig {
            path,
            host: hmr
                .and_then(|h| h.host.clone())
                .unwrap_or_else(|| listener.host().to_string()),
            port: hmr.and_then(|h| h.port),
            secure: self.https.is_some(),
            client_port: hmr.and_then(|h| h.client_port),
            protocol: hmr.and_then(|h| h.protocol.clone()),
            timeout_ms: hmr.and_then(|h| h.timeout).unwrap_or(30_000),
            overlay: hmr.and_then(|h| h.overlay).unwrap_or(true),
        };
        let channels = hmr.map(|h| h.channels.clone()).unwrap_or_default();

        let ws = WsServer::new(config, listener).with_channels(channels);
        log_event_with_fields(Event::HmrChannelCreated, &[("path", ws.path())]);
        Ok(HmrChannel::Active(ws))
    }
}
