//! HMR channel surface
//!
//! `HmrChannel` is either a live websocket server or the inert stand-in used
//! when `ws: false`. Both expose the same `HmrTransport` surface, so callers
//! never branch on whether HMR is enabled.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use uuid::Uuid;

use super::errors::HmrResult;
use super::payload::HmrPayload;
use super::ws::WsServer;

/// Connected client id
pub type ClientId = Uuid;

/// Handle returned by `on`, used to remove the listener again
pub type ListenerId = u64;

/// Listener for a custom client event: `(data, client)`
pub type EventListener = Arc<dyn Fn(&Value, ClientId) + Send + Sync>;

/// Method surface shared by every HMR transport
pub trait HmrTransport: Send + Sync {
    fn name(&self) -> &str;

    /// Register a listener for a custom client event
    fn on(&self, event: &str, listener: EventListener) -> ListenerId;

    /// Remove a listener; unknown ids are ignored
    fn off(&self, event: &str, id: ListenerId);

    fn listen(&self) -> BoxFuture<'_, HmrResult<()>>;

    /// Broadcast to every connected client
    fn send(&self, payload: &HmrPayload);

    fn close(&self) -> BoxFuture<'_, HmrResult<()>>;

    fn clients(&self) -> HashSet<ClientId>;
}

/// Inert channel for `ws: false`
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledChannel;

impl HmrTransport for DisabledChannel {
    fn name(&self) -> &str {
        "ws"
    }

    fn on(&self, _event: &str, _listener: EventListener) -> ListenerId {
        0
    }

    fn off(&self, _event: &str, _id: ListenerId) {}

    fn listen(&self) -> BoxFuture<'_, HmrResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn send(&self, _payload: &HmrPayload) {}

    fn close(&self) -> BoxFuture<'_, HmrResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn clients(&self) -> HashSet<ClientId> {
        HashSet::new()
    }
}

/// The dev server's HMR channel
pub enum HmrChannel {
    Active(WsServer),
    Disabled(DisabledChannel),
}

impl std::fmt::Debug for HmrChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HmrChannel::Active(_) => f.debug_tuple("Active").finish_non_exhaustive(),
            HmrChannel::Disabled(d) => f.debug_tuple("Disabled").field(d).finish(),
        }
    }
}

impl HmrChannel {
    pub fn is_active(&self) -> bool {
        matches!(self, HmrChannel::Active(_))
    }

    fn transport(&self) -> &dyn HmrTransport {
        match self {
            HmrChannel::Active(ws) => ws,
            HmrChannel::Disabled(disabled) => disabled,
        }
    }
}

impl HmrTransport for HmrChannel {
    fn name(&self) -> &str {
        self.transport().name()
    }

    fn on(&self, event: &str, listener: EventListener) -> ListenerId {
        self.transport().on(event, listener)
    }

    fn off(&self, event: &str, id: ListenerId) {
        self.transport().off(event, id)
    }

    fn listen(&self) -> BoxFuture<'_, HmrResult<()>> {
        self.transport().listen()
    }

    fn send(&self, payload: &HmrPayload) {
        self.transport().send(payload)
    }

    fn close(&self) -> BoxFuture<'_, HmrResult<()>> {
        self.transport().close()
    }

    fn clients(&self) -> HashSet<ClientId> {
        self.transport().clients()
    }
}
