//! # Hot module replacement channel
//!
//! Websocket push channel between the dev server and browser clients.

mod channel;
mod errors;
mod payload;
mod ws;

pub use channel::{ClientId, DisabledChannel, EventListener, HmrChannel, HmrTransport, ListenerId};
pub use errors::{HmrError, HmrResult};
pub use payload::{ErrorPayload, HmrPayload, Update, UpdateKind};
pub use ws::{HmrClientConfig, WsConfig, WsServer};
