//! HMR payloads pushed to browser clients
//!
//! JSON text frames with a `type` tag.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server → client payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HmrPayload {
    /// Sent once after the socket opens
    Connected,

    Update {
        updates: Vec<Update>,
    },

    FullReload {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },

    Prune {
        paths: Vec<String>,
    },

    Custom {
        event: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },

    Error {
        err: ErrorPayload,
    },
}

impl HmrPayload {
    pub fn full_reload() -> Self {
        HmrPayload::FullReload { path: None }
    }

    pub fn custom(event: impl Into<String>, data: Option<Value>) -> Self {
        HmrPayload::Custom {
            event: event.into(),
            data,
        }
    }
}

/// One module update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub path: String,
    pub accepted_path: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl Update {
    /// An update stamped with the current time
    pub fn now(kind: UpdateKind, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            kind,
            accepted_path: path.clone(),
            path,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateKind {
    JsUpdate,
    CssUpdate,
}

/// Error overlay content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default)]
    pub stack: String,
}

/// Client → server message
///
/// Only `custom` messages are meaningful; anything else is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub(crate) enum ClientMessage {
    Custom {
        event: String,
        #[serde(default)]
        data: Value,
    },
    #[serde(other)]
    Other,
}
