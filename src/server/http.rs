//! HTTP(S) listener handle
//!
//! The handle is created during bootstrap but only binds on `listen()`, so
//! the HMR channel can attach its upgrade route in between. Plain HTTP is
//! served by `axum::serve`; HTTPS runs a rustls accept loop feeding
//! hyper-util's auto (h1/h2) connection builder.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, RwLock};

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::Request;
use axum::routing::get;
use axum::Router;
use futures_util::future::BoxFuture;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_rustls::rustls;
use tokio_rustls::TlsAcceptor;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::errors::{ServerError, ServerResult};
use super::middleware::MiddlewareStack;
use crate::config::{HttpsConfig, ServerOptions};
use crate::observability::{log_event_with_fields, Event};

/// Resolved HTTPS options
#[derive(Clone)]
pub struct HttpsOptions {
    pub config: HttpsConfig,
    acceptor: TlsAcceptor,
}

impl HttpsOptions {
    pub fn acceptor(&self) -> &TlsAcceptor {
        &self.acceptor
    }
}

impl fmt::Debug for HttpsOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpsOptions")
            .field("cert", &self.config.cert)
            .field("key", &self.config.key)
            .finish()
    }
}

/// Load the PEM certificate chain and key named by the config
///
/// Returns `None` when HTTPS is not configured. File reads run on the
/// blocking pool.
pub async fn resolve_https_config(https: Option<&HttpsConfig>) -> ServerResult<Option<HttpsOptions>> {
    let Some(https) = https.cloned() else {
        return Ok(None);
    };

    let config = https.clone();
    let acceptor = tokio::task::spawn_blocking(move || build_acceptor(&config.cert, &config.key))
        .await
        .map_err(|e| ServerError::Internal(format!("TLS loader task failed: {}", e)))??;

    log_event_with_fields(
        Event::HttpsResolved,
        &[
            ("cert", &https.cert.display().to_string()),
            ("key", &https.key.display().to_string()),
        ],
    );

    Ok(Some(HttpsOptions {
        config: https,
        acceptor,
    }))
}

fn build_acceptor(cert_path: &Path, key_path: &Path) -> ServerResult<TlsAcceptor> {
    let cert_file = File::open(cert_path).map_err(|e| {
        ServerError::Tls(format!("Failed to open certificate file {:?}: {}", cert_path, e))
    })?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(cert_file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Tls(format!("Failed to parse certificates: {}", e)))?;

    if certs.is_empty() {
        return Err(ServerError::Tls(
            "No certificates found in certificate file".to_string(),
        ));
    }

    let key_file = File::open(key_path)
        .map_err(|e| ServerError::Tls(format!("Failed to open key file {:?}: {}", key_path, e)))?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(key_file))
        .map_err(|e| ServerError::Tls(format!("Failed to parse private key: {}", e)))?
        .ok_or_else(|| ServerError::Tls("No private key found in key file".to_string()))?;

    let mut config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ServerError::Tls(format!("Failed to build TLS config: {}", e)))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Receives sockets upgraded on an attached path
pub trait SocketHandler: Send + Sync {
    fn handle_socket(self: Arc<Self>, socket: WebSocket) -> BoxFuture<'static, ()>;
}

struct UpgradeRoute {
    path: String,
    handler: Arc<dyn SocketHandler>,
}

/// An HTTP(S) listener, created unbound
pub struct HttpServerHandle {
    host: String,
    port: u16,
    https: Option<HttpsOptions>,
    cors: Option<CorsLayer>,
    middlewares: MiddlewareStack,
    upgrades: RwLock<Vec<UpgradeRoute>>,
    local_addr: RwLock<Option<SocketAddr>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl HttpServerHandle {
    /// Create an unbound listener serving `middlewares`
    pub fn new(
        host: impl Into<String>,
        port: u16,
        https: Option<HttpsOptions>,
        middlewares: MiddlewareStack,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            host: host.into(),
            port,
            https,
            cors: None,
            middlewares,
            upgrades: RwLock::new(Vec::new()),
            local_addr: RwLock::new(None),
            shutdown_tx,
        }
    }

    /// Apply a CORS layer to everything this listener serves
    pub fn with_cors(mut self, cors: CorsLayer) -> Self {
        self.cors = Some(cors);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Configured port; 0 means "pick one" until `listen()` resolves it
    pub fn port(&self) -> u16 {
        self.local_addr().map(|a| a.port()).unwrap_or(self.port)
    }

    pub fn is_https(&self) -> bool {
        self.https.is_some()
    }

    pub fn middlewares(&self) -> &MiddlewareStack {
        &self.middlewares
    }

    /// Bound address once listening
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.read().ok().and_then(|addr| *addr)
    }

    pub fn is_listening(&self) -> bool {
        self.local_addr().is_some()
    }

    /// Route websocket upgrades on `path` to `handler`
    ///
    /// Takes effect on the next `listen()`.
    pub fn attach_upgrade(&self, path: impl Into<String>, handler: Arc<dyn SocketHandler>) {
        let route = UpgradeRoute {
            path: path.into(),
            handler,
        };
        match self.upgrades.write() {
            Ok(mut upgrades) => upgrades.push(route),
            Err(poisoned) => poisoned.into_inner().push(route),
        }
    }

    /// Paths with an attached upgrade handler
    pub fn upgrade_paths(&self) -> Vec<String> {
        self.upgrades
            .read()
            .map(|routes| routes.iter().map(|r| r.path.clone()).collect())
            .unwrap_or_default()
    }

    /// Router with upgrade routes first and the middleware stack as fallback
    pub fn router(&self) -> Router {
        let mut router = Router::new();

        if let Ok(routes) = self.upgrades.read() {
            for route in routes.iter() {
                let handler = Arc::clone(&route.handler);
                router = router.route(
                    &route.path,
                    get(move |ws: WebSocketUpgrade| {
                        let handler = Arc::clone(&handler);
                        async move { ws.on_upgrade(move |socket| handler.handle_socket(socket)) }
                    }),
                );
            }
        }

        let stack = self.middlewares.clone();
        router = router.fallback(move |req: Request| {
            let stack = stack.clone();
            async move { stack.handle(req).await }
        });

        match &self.cors {
            Some(cors) => router.layer(cors.clone()),
            None => router,
        }
    }

    /// Bind and start serving in the background
    pub async fn listen(&self) -> ServerResult<SocketAddr> {
        let bind_addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .await
            .map_err(|source| ServerError::Bind {
                addr: bind_addr,
                source,
            })?;
        let addr = listener.local_addr()?;

        if let Ok(mut local) = self.local_addr.write() {
            *local = Some(addr);
        }

        let router = self.router();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        match &self.https {
            None => {
                tokio::spawn(async move {
                    let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
                        let _ = shutdown_rx.recv().await;
                    });
                    if let Err(e) = serve.await {
                        log_event_with_fields(
                            Event::HttpConnectionFailed,
                            &[("error", &e.to_string())],
                        );
                    }
                });
            }
            Some(https) => {
                let acceptor = https.acceptor().clone();
                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            accepted = listener.accept() => match accepted {
                                Ok((stream, peer)) => {
                                    let acceptor = acceptor.clone();
                                    let router = router.clone();
                                    tokio::spawn(async move {
                                        serve_tls_connection(stream, peer, acceptor, router).await;
                                    });
                                }
                                Err(e) => {
                                    log_event_with_fields(
                                        Event::HttpConnectionFailed,
                                        &[("error", &e.to_string())],
                                    );
                                }
                            },
                            _ = shutdown_rx.recv() => break,
                        }
                    }
                });
            }
        }

        log_event_with_fields(
            Event::HttpListening,
            &[
                ("addr", &addr.to_string()),
                ("https", if self.is_https() { "true" } else { "false" }),
            ],
        );

        Ok(addr)
    }

    /// Stop accepting connections
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(());
        if let Ok(mut local) = self.local_addr.write() {
            if local.take().is_some() {
                log_event_with_fields(Event::HttpClosed, &[("host", &self.host)]);
            }
        }
    }
}

async fn serve_tls_connection(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    router: Router,
) {
    let tls_stream = match acceptor.accept(stream).await {
        Ok(s) => s,
        Err(e) => {
            log_event_with_fields(
                Event::HttpConnectionFailed,
                &[("peer", &peer.to_string()), ("error", &e.to_string())],
            );
            return;
        }
    };

    let service = TowerToHyperService::new(router);
    if let Err(e) = auto::Builder::new(TokioExecutor::new())
        .serve_connection_with_upgrades(TokioIo::new(tls_stream), service)
        .await
    {
        log_event_with_fields(
            Event::HttpConnectionFailed,
            &[("peer", &peer.to_string()), ("error", &e.to_string())],
        );
    }
}

impl fmt::Debug for HttpServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServerHandle")
            .field("host", &self.host)
            .field("port", &self.port())
            .field("https", &self.is_https())
            .field("upgrades", &self.upgrade_paths())
            .field("listening", &self.is_listening())
            .finish()
    }
}

/// CORS layer for the configured origin, permissive when none is set
pub fn cors_layer(options: &ServerOptions) -> Option<CorsLayer> {
    if !options.cors {
        return None;
    }

    let layer = match options.origin.as_ref().and_then(|o| o.parse().ok()) {
        Some(origin) => CorsLayer::new().allow_origin(AllowOrigin::exact(origin)),
        None => CorsLayer::new().allow_origin(Any),
    };
    Some(layer.allow_methods(Any).allow_headers(Any))
}

/// Create the (unbound) HTTP(S) listener for the dev server
pub fn resolve_http_server(
    options: &ServerOptions,
    middlewares: MiddlewareStack,
    https: Option<HttpsOptions>,
) -> Arc<HttpServerHandle> {
    let mut handle = HttpServerHandle::new(options.host.clone(), options.port, https, middlewares);
    if let Some(cors) = cors_layer(options) {
        handle = handle.with_cors(cors);
    }
    Arc::new(handle)
}
