//! HMR Channel Tests
//!
//! - `ws: false` yields an inert channel
//! - A channel without a listener is refused
//! - A live channel greets clients, dispatches custom events and broadcasts

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use devhost::config::{DevConfig, HmrOptions, HmrSetting};
use devhost::hmr::{
    ClientId, EventListener, HmrChannel, HmrPayload, HmrResult, HmrTransport, ListenerId,
};
use devhost::server::{DevServer, InternalDevServer, ServerError};
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

// =============================================================================
// Helper Functions
// =============================================================================

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn config(json: &str) -> DevConfig {
    let mut config = DevConfig::from_json_str(json).unwrap();
    config.public_dir = None;
    config
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn started(config: DevConfig) -> Arc<InternalDevServer> {
    let server = DevServer::new(config).create_server().await.unwrap();
    server.listen().await.unwrap();
    server
}

// =============================================================================
// Construction
// =============================================================================

/// The disabled stand-in accepts every call and never has clients.
#[tokio::test]
async fn test_ws_false_channel_is_inert() {
    let bootstrap = DevServer::new(config(r#"{"server": {"ws": false, "watchOptions": null}}"#));
    let channel = bootstrap.create_hmr_channel().unwrap();
    assert!(!channel.is_active());

    let id = channel.on("vite:beforeUpdate", Arc::new(|_, _| {}));
    channel.listen().await.unwrap();
    channel.send(&HmrPayload::full_reload());
    assert!(channel.clients().is_empty());
    channel.off("vite:beforeUpdate", id);
    channel.close().await.unwrap();
    assert!(channel.clients().is_empty());
}

/// Without any listener the channel cannot exist.
#[test]
fn test_missing_listener_is_server_unavailable() {
    let bootstrap = DevServer::new(config(r#"{"server": {"watchOptions": null}}"#));
    let err = bootstrap.create_hmr_channel().unwrap_err();
    assert!(matches!(err, ServerError::ServerUnavailable));
    assert_eq!(err.code(), "DEVHOST_SERVER_UNAVAILABLE");
}

#[tokio::test]
async fn test_middleware_mode_without_server_fails_startup() {
    let config = config(r#"{"server": {"middlewareMode": true, "watchOptions": null}}"#);
    let err = DevServer::new(config).create_server().await.unwrap_err();
    assert!(matches!(err, ServerError::ServerUnavailable));
}

// =============================================================================
// Live Channel
// =============================================================================

/// A client is greeted, its custom events reach listeners, broadcasts reach it.
#[tokio::test]
async fn test_live_channel_round_trip() {
    let server = started(config(
        r#"{"server": {"host": "127.0.0.1", "port": 0, "watchOptions": null}}"#,
    ))
    .await;
    let ws = server.ws().unwrap();
    assert!(ws.is_active());

    let (tx, mut rx) = mpsc::unbounded_channel();
    ws.on(
        "plugin:ping",
        Arc::new(move |data: &Value, _| {
            let _ = tx.send(data.clone());
        }),
    );

    let addr = server.http_server().unwrap().local_addr().unwrap();
    let (mut client, _) = connect_async(format!("ws://{}/__hmr", addr)).await.unwrap();
    assert_eq!(next_json(&mut client).await, json!({"type": "connected"}));
    assert_eq!(ws.clients().len(), 1);

    client
        .send(Message::Text(
            json!({"type": "custom", "event": "plugin:ping", "data": {"n": 7}}).to_string(),
        ))
        .await
        .unwrap();
    let data = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(data, json!({"n": 7}));

    ws.send(&HmrPayload::custom("plugin:pong", Some(json!(1))));
    assert_eq!(
        next_json(&mut client).await,
        json!({"type": "custom", "event": "plugin:pong", "data": 1})
    );

    server.close().await.unwrap();
    assert!(ws.clients().is_empty());
}

/// `hmr.port` different from the HTTP port gets its own listener.
#[tokio::test]
async fn test_standalone_hmr_port() {
    let free_port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let mut config = config(r#"{"server": {"host": "127.0.0.1", "port": 0, "watchOptions": null}}"#);
    config.server.hmr = HmrSetting::Options(HmrOptions {
        port: Some(free_port),
        ..Default::default()
    });
    let server = started(config).await;
    let http = server.http_server().unwrap();
    assert!(http.upgrade_paths().is_empty());

    let (mut client, _) = connect_async(format!("ws://127.0.0.1:{}/", free_port))
        .await
        .unwrap();
    assert_eq!(next_json(&mut client).await["type"], "connected");

    server.ws().unwrap().send(&HmrPayload::full_reload());
    assert_eq!(next_json(&mut client).await, json!({"type": "full-reload"}));

    server.close().await.unwrap();
}

/// HMR path is joined onto the public path.
#[tokio::test]
async fn test_hmr_path_under_public_path() {
    let server = DevServer::new(config(
        r#"{"publicPath": "/app/", "server": {"host": "127.0.0.1", "port": 0, "watchOptions": null, "hmr": {"path": "/socket"}}}"#,
    ))
    .create_server()
    .await
    .unwrap();

    match server.ws().as_deref() {
        Some(HmrChannel::Active(ws)) => {
            assert_eq!(ws.path(), "/app/socket");
            assert_eq!(ws.client_config().path, "/app/socket");
        }
        _ => panic!("expected an active channel"),
    }
    assert_eq!(
        server.http_server().unwrap().upgrade_paths(),
        vec!["/app/socket"]
    );
}

// =============================================================================
// Pre-built Channels
// =============================================================================

/// In-process transport standing in for an embedder's channel
#[derive(Default)]
struct RecordingChannel {
    listeners: Mutex<Vec<(ListenerId, String, EventListener)>>,
    sent: Mutex<Vec<HmrPayload>>,
    listens: Mutex<usize>,
    closes: Mutex<usize>,
}

impl RecordingChannel {
    /// Deliver a custom event as if a client sent it over this channel
    fn receive(&self, event: &str, data: Value) {
        let listeners: Vec<EventListener> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, name, _)| name == event)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();
        let client = Uuid::new_v4();
        for listener in listeners {
            listener(&data, client);
        }
    }
}

impl HmrTransport for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn on(&self, event: &str, listener: EventListener) -> ListenerId {
        let mut listeners = self.listeners.lock().unwrap();
        let id = 100 + listeners.len() as ListenerId;
        listeners.push((id, event.to_string(), listener));
        id
    }

    fn off(&self, event: &str, id: ListenerId) {
        self.listeners
            .lock()
            .unwrap()
            .retain(|(existing, name, _)| !(*existing == id && name == event));
    }

    fn listen(&self) -> BoxFuture<'_, HmrResult<()>> {
        *self.listens.lock().unwrap() += 1;
        Box::pin(async { Ok(()) })
    }

    fn send(&self, payload: &HmrPayload) {
        self.sent.lock().unwrap().push(payload.clone());
    }

    fn close(&self) -> BoxFuture<'_, HmrResult<()>> {
        *self.closes.lock().unwrap() += 1;
        Box::pin(async { Ok(()) })
    }

    fn clients(&self) -> HashSet<ClientId> {
        HashSet::new()
    }
}

/// Every transport call on the websocket channel reaches pre-built channels too.
#[tokio::test]
async fn test_prebuilt_channels_mirror_the_websocket() {
    let recording = Arc::new(RecordingChannel::default());
    let mut config = config(r#"{"server": {"host": "127.0.0.1", "port": 0, "watchOptions": null}}"#);
    config.server.hmr = HmrSetting::Options(HmrOptions {
        channels: vec![Arc::clone(&recording) as Arc<dyn HmrTransport>],
        ..Default::default()
    });

    let server = started(config).await;
    assert_eq!(*recording.listens.lock().unwrap(), 1);
    let ws = server.ws().unwrap();

    let heard = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&heard);
    let id = ws.on(
        "plugin:save",
        Arc::new(move |data: &Value, _| sink.lock().unwrap().push(data.clone())),
    );
    assert_eq!(recording.listeners.lock().unwrap().len(), 1);

    recording.receive("plugin:save", json!({"file": "a.ts"}));
    assert_eq!(*heard.lock().unwrap(), vec![json!({"file": "a.ts"})]);

    ws.send(&HmrPayload::full_reload());
    assert_eq!(*recording.sent.lock().unwrap(), vec![HmrPayload::full_reload()]);

    ws.off("plugin:save", id);
    assert!(recording.listeners.lock().unwrap().is_empty());
    recording.receive("plugin:save", json!(null));
    assert_eq!(heard.lock().unwrap().len(), 1);

    server.close().await.unwrap();
    assert_eq!(*recording.closes.lock().unwrap(), 1);
}

// =============================================================================
// Watch Reloads
// =============================================================================

/// Editing a stylesheet on disk pushes a css-update to connected clients.
#[tokio::test]
async fn test_stylesheet_edit_reaches_client() {
    let tmp = tempfile::TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    std::fs::create_dir_all(root.join("src")).unwrap();
    std::fs::write(root.join("src/app.css"), "body {}").unwrap();

    let mut config = config(
        r#"{"server": {"host": "127.0.0.1", "port": 0, "watchOptions": {"pollIntervalMs": 50}}}"#,
    );
    config.root = root.clone();
    let server = started(config).await;
    assert!(server.watcher().is_enabled());
    let reloads = server.spawn_watch_reloads();

    let addr = server.http_server().unwrap().local_addr().unwrap();
    let (mut client, _) = connect_async(format!("ws://{}/__hmr", addr)).await.unwrap();
    assert_eq!(next_json(&mut client).await["type"], "connected");

    tokio::time::sleep(Duration::from_millis(200)).await;
    std::fs::write(root.join("src/app.css"), "body { color: red; }").unwrap();

    let update = loop {
        let frame = next_json(&mut client).await;
        if frame["type"] == "update" {
            break frame;
        }
    };
    assert_eq!(update["updates"][0]["type"], "css-update");
    assert_eq!(update["updates"][0]["path"], "/src/app.css");

    reloads.abort();
    server.close().await.unwrap();
}
