//! WebSocket HMR server
//!
//! Attaches an upgrade route to the dev server's listener at construction,
//! so the route is in place whenever that listener starts. When `hmr.port`
//! names a different port the channel instead binds its own plain-ws
//! listener on `listen()`.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use axum::extract::ws::{Message as AxumMessage, WebSocket};
use futures_util::future::BoxFuture;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message as TungsteniteMessage};
use uuid::Uuid;

use super::channel::{ClientId, EventListener, HmrTransport, ListenerId};
use super::errors::{HmrError, HmrResult};
use super::payload::{ClientMessage, HmrPayload};
use crate::observability::{log_event_with_fields, Event};
use crate::server::{HttpServerHandle, SocketHandler};

/// Resolved HMR channel settings
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Upgrade path, public path included
    pub path: String,
    pub host: String,
    /// Own listener port when it differs from the HTTP port
    pub port: Option<u16>,
    /// The HTTP listener uses TLS
    pub secure: bool,
    pub client_port: Option<u16>,
    pub protocol: Option<String>,
    pub timeout_ms: u64,
    pub overlay: bool,
}

/// Connection settings for the browser client, serialized by the embedder
/// into the injected client script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HmrClientConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub timeout: u64,
    pub overlay: bool,
}

enum Frame {
    Text(String),
    Close,
    Other,
}

/// Client registry and event listeners, shared with connection tasks
#[derive(Default)]
pub(crate) struct WsShared {
    clients: RwLock<HashMap<ClientId, mpsc::UnboundedSender<String>>>,
    listeners: RwLock<HashMap<String, Vec<(ListenerId, EventListener)>>>,
    next_listener: AtomicU64,
}

impl WsShared {
    fn register(&self, id: ClientId, tx: mpsc::UnboundedSender<String>) {
        if let Ok(mut clients) = self.clients.write() {
            clients.insert(id, tx);
        }
        log_event_with_fields(Event::HmrClientConnected, &[("client", &id.to_string())]);
    }

    fn unregister(&self, id: ClientId) {
        if let Ok(mut clients) = self.clients.write() {
            clients.remove(&id);
        }
        log_event_with_fields(Event::HmrClientDisconnected, &[("client", &id.to_string())]);
    }

    fn broadcast(&self, text: &str) {
        if let Ok(clients) = self.clients.read() {
            for tx in clients.values() {
                let _ = tx.send(text.to_string());
            }
        }
    }

    fn emit(&self, event: &str, data: &Value, client: ClientId) {
        let listeners: Vec<EventListener> = match self.listeners.read() {
            Ok(map) => map
                .get(event)
                .map(|l| l.iter().map(|(_, f)| Arc::clone(f)).collect())
                .unwrap_or_default(),
            Err(_) => return,
        };
        for listener in listeners {
            listener(data, client);
        }
    }

    fn dispatch_text(&self, text: &str, client: ClientId) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Custom { event, data }) => self.emit(&event, &data, client),
            Ok(ClientMessage::Other) => {}
            Err(e) => log_event_with_fields(
                Event::HmrInvalidMessage,
                &[("client", &client.to_string()), ("error", &e.to_string())],
            ),
        }
    }

    async fn serve_client<S, M, E>(
        self: Arc<Self>,
        socket: S,
        text: fn(String) -> M,
        frame: fn(M) -> Frame,
    ) where
        S: Stream<Item = Result<M, E>> + Sink<M> + Send + 'static,
        M: Send + Unpin + 'static,
        E: Display + Send + 'static,
    {
        let (mut sink, mut stream) = socket.split();
        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        if let Ok(connected) = serde_json::to_string(&HmrPayload::Connected) {
            let _ = tx.send(connected);
        }
        self.register(id, tx);
        self.emit("connection", &Value::Null, id);

        loop {
            tokio::select! {
                incoming = stream.next() => match incoming {
                    Some(Ok(msg)) => match frame(msg) {
                        Frame::Text(t) => self.dispatch_text(&t, id),
                        Frame::Close => break,
                        Frame::Other => {}
                    },
                    Some(Err(e)) => {
                        log_event_with_fields(
                            Event::HmrInvalidMessage,
                            &[("client", &id.to_string()), ("error", &e.to_string())],
                        );
                        break;
                    }
                    None => break,
                },
                outgoing = rx.recv() => match outgoing {
                    Some(payload) => {
                        if sink.send(text(payload)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        self.unregister(id);
        let _ = sink.close().await;
    }
}

impl SocketHandler for WsShared {
    fn handle_socket(self: Arc<Self>, socket: WebSocket) -> BoxFuture<'static, ()> {
        Box::pin(self.serve_client(socket, AxumMessage::Text, |msg| match msg {
            AxumMessage::Text(t) => Frame::Text(t),
            AxumMessage::Close(_) => Frame::Close,
            _ => Frame::Other,
        }))
    }
}

/// Live HMR channel
pub struct WsServer {
    config: WsConfig,
    server: Arc<HttpServerHandle>,
    shared: Arc<WsShared>,
    channels: Vec<Arc<dyn HmrTransport>>,
    /// listener id -> ids the pre-built channels returned, in channel order
    forwarded: RwLock<HashMap<ListenerId, Vec<ListenerId>>>,
    listening: AtomicBool,
    closed: AtomicBool,
    standalone_addr: RwLock<Option<SocketAddr>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl WsServer {
    /// Create the channel bound to `server`
    pub fn new(config: WsConfig, server: Arc<HttpServerHandle>) -> Self {
        let shared = Arc::new(WsShared::default());
        let (shutdown_tx, _) = broadcast::channel(1);
        let ws = Self {
            config,
            server,
            shared,
            channels: Vec::new(),
            forwarded: RwLock::new(HashMap::new()),
            listening: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            standalone_addr: RwLock::new(None),
            shutdown_tx,
        };

        if !ws.is_standalone() {
            let handler: Arc<dyn SocketHandler> = ws.shared.clone();
            ws.server.attach_upgrade(ws.config.path.clone(), handler);
        }
        ws
    }

    /// Also forward payloads and listeners to these pre-built transports
    pub fn with_channels(mut self, channels: Vec<Arc<dyn HmrTransport>>) -> Self {
        self.channels = channels;
        self
    }

    pub fn config(&self) -> &WsConfig {
        &self.config
    }

    pub fn path(&self) -> &str {
        &self.config.path
    }

    /// The listener this channel is bound to
    pub fn http_server(&self) -> &Arc<HttpServerHandle> {
        &self.server
    }

    /// Whether this channel runs its own listener
    pub fn is_standalone(&self) -> bool {
        matches!(self.config.port, Some(port) if port != self.server.port())
    }

    /// Address of the standalone listener once bound
    pub fn standalone_addr(&self) -> Option<SocketAddr> {
        self.standalone_addr.read().ok().and_then(|a| *a)
    }

    /// Settings for the browser client
    ///
    /// Not sent over the socket. Embedders serialize it into the client
    /// script they serve, which needs it before it can connect at all.
    pub fn client_config(&self) -> HmrClientConfig {
        let port = self
            .config
            .client_port
            .or_else(|| self.standalone_addr().map(|a| a.port()))
            .or(self.config.port)
            .unwrap_or_else(|| self.server.port());
        let protocol = self.config.protocol.clone().unwrap_or_else(|| {
            if self.config.secure && !self.is_standalone() {
                "wss".to_string()
            } else {
                "ws".to_string()
            }
        });

        HmrClientConfig {
            protocol,
            host: self.config.host.clone(),
            port,
            path: self.config.path.clone(),
            timeout: self.config.timeout_ms,
            overlay: self.config.overlay,
        }
    }

    async fn listen_standalone(&self, port: u16) -> HmrResult<()> {
        let addr = format!("{}:{}", self.config.host, port);
        let listener = TcpListener::bind((self.config.host.as_str(), port))
            .await
            .map_err(|e| HmrError::Bind {
                addr: addr.clone(),
                message: e.to_string(),
            })?;
        let local = listener.local_addr().map_err(|e| HmrError::Bind {
            addr,
            message: e.to_string(),
        })?;
        if let Ok(mut slot) = self.standalone_addr.write() {
            *slot = Some(local);
        }

        let shared = Arc::clone(&self.shared);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            let shared = Arc::clone(&shared);
                            tokio::spawn(async move {
                                match accept_async(stream).await {
                                    Ok(socket) => {
                                        shared
                                            .serve_client(socket, TungsteniteMessage::Text, |msg| match msg {
                                                TungsteniteMessage::Text(t) => Frame::Text(t),
                                                TungsteniteMessage::Close(_) => Frame::Close,
                                                _ => Frame::Other,
                                            })
                                            .await
                                    }
                                    Err(e) => log_event_with_fields(
                                        Event::HmrInvalidMessage,
                                        &[
                                            ("peer", &peer.to_string()),
                                            ("error", &HmrError::Handshake(e.to_string()).to_string()),
                                        ],
                                    ),
                                }
                            });
                        }
                        Err(e) => log_event_with_fields(
                            Event::HttpConnectionFailed,
                            &[("error", &e.to_string())],
                        ),
                    },
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Ok(())
    }
}

impl HmrTransport for WsServer {
    fn name(&self) -> &str {
        "ws"
    }

    fn on(&self, event: &str, listener: EventListener) -> ListenerId {
        let id = self.shared.next_listener.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut listeners) = self.shared.listeners.write() {
            listeners
                .entry(event.to_string())
                .or_default()
                .push((id, Arc::clone(&listener)));
        }

        if !self.channels.is_empty() {
            let ids = self
                .channels
                .iter()
                .map(|channel| channel.on(event, Arc::clone(&listener)))
                .collect();
            if let Ok(mut forwarded) = self.forwarded.write() {
                forwarded.insert(id, ids);
            }
        }
        id
    }

    fn off(&self, event: &str, id: ListenerId) {
        if let Ok(mut listeners) = self.shared.listeners.write() {
            if let Some(registered) = listeners.get_mut(event) {
                registered.retain(|(existing, _)| *existing != id);
            }
        }

        let ids = self
            .forwarded
            .write()
            .ok()
            .and_then(|mut forwarded| forwarded.remove(&id));
        for (channel, channel_id) in self.channels.iter().zip(ids.unwrap_or_default()) {
            channel.off(event, channel_id);
        }
    }

    fn listen(&self) -> BoxFuture<'_, HmrResult<()>> {
        Box::pin(async move {
            if self.closed.load(Ordering::SeqCst) {
                return Err(HmrError::Closed);
            }
            if self.listening.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            if let Some(port) = self.config.port.filter(|_| self.is_standalone()) {
                self.listen_standalone(port).await?;
            }
            for channel in &self.channels {
                channel.listen().await?;
            }
            Ok(())
        })
    }

    fn send(&self, payload: &HmrPayload) {
        match serde_json::to_string(payload) {
            Ok(text) => self.shared.broadcast(&text),
            Err(e) => log_event_with_fields(
                Event::HmrInvalidMessage,
                &[("error", &HmrError::from(e).to_string())],
            ),
        }
        for channel in &self.channels {
            channel.send(payload);
        }
    }

    fn close(&self) -> BoxFuture<'_, HmrResult<()>> {
        Box::pin(async move {
            self.closed.store(true, Ordering::SeqCst);
            let _ = self.shutdown_tx.send(());
            if let Ok(mut clients) = self.shared.clients.write() {
                clients.clear();
            }
            self.listening.store(false, Ordering::SeqCst);
            for channel in &self.channels {
                channel.close().await?;
            }
            Ok(())
        })
    }

    fn clients(&self) -> HashSet<ClientId> {
        self.shared
            .clients
            .read()
            .map(|clients| clients.keys().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::MiddlewareStack;
    use std::sync::Mutex;

    fn handle() -> Arc<HttpServerHandle> {
        Arc::new(HttpServerHandle::new(
            "127.0.0.1",
            9000,
            None,
            MiddlewareStack::new(),
        ))
    }

    fn config(port: Option<u16>) -> WsConfig {
        WsConfig {
            path: "/__hmr".into(),
            host: "127.0.0.1".into(),
            port,
            secure: false,
            client_port: None,
            protocol: None,
            timeout_ms: 30_000,
            overlay: true,
        }
    }

    #[test]
    fn test_attaches_upgrade_route() {
        let server = handle();
        let ws = WsServer::new(config(None), Arc::clone(&server));
        assert!(!ws.is_standalone());
        assert_eq!(server.upgrade_paths(), vec!["/__hmr"]);

        let same_port = WsServer::new(config(Some(9000)), Arc::clone(&server));
        assert!(!same_port.is_standalone());
    }

    #[test]
    fn test_standalone_does_not_attach() {
        let server = handle();
        let ws = WsServer::new(config(Some(9801)), Arc::clone(&server));
        assert!(ws.is_standalone());
        assert!(server.upgrade_paths().is_empty());
    }

    #[test]
    fn test_client_config() {
        let ws = WsServer::new(config(None), handle());
        let client = ws.client_config();
        assert_eq!(client.protocol, "ws");
        assert_eq!(client.port, 9000);
        assert_eq!(client.path, "/__hmr");

        let mut secure = config(None);
        secure.secure = true;
        secure.client_port = Some(443);
        let client = WsServer::new(secure, handle()).client_config();
        assert_eq!(client.protocol, "wss");
        assert_eq!(client.port, 443);
    }

    #[test]
    fn test_listeners_on_off() {
        let ws = WsServer::new(config(None), handle());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = ws.on(
            "plugin:event",
            Arc::new(move |data, _| sink.lock().unwrap().push(data.clone())),
        );

        let client = Uuid::new_v4();
        ws.shared
            .dispatch_text(r#"{"type":"custom","event":"plugin:event","data":1}"#, client);
        ws.off("plugin:event", id);
        ws.shared
            .dispatch_text(r#"{"type":"custom","event":"plugin:event","data":2}"#, client);
        ws.shared.dispatch_text("not json", client);

        assert_eq!(*seen.lock().unwrap(), vec![Value::from(1)]);
    }

    #[tokio::test]
    async fn test_send_reaches_registered_clients() {
        let ws = WsServer::new(config(None), handle());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = Uuid::new_v4();
        ws.shared.register(client, tx);

        assert_eq!(ws.clients(), HashSet::from([client]));
        ws.send(&HmrPayload::full_reload());
        let text = rx.recv().await.unwrap();
        assert_eq!(text, r#"{"type":"full-reload"}"#);

        ws.close().await.unwrap();
        assert!(ws.clients().is_empty());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_listen_after_close_fails() {
        let ws = WsServer::new(config(None), handle());
        ws.listen().await.unwrap();
        ws.close().await.unwrap();

        let err = ws.listen().await.unwrap_err();
        assert!(matches!(err, HmrError::Closed));
        assert_eq!(err.code(), "DEVHOST_HMR_CLOSED");
    }
}
