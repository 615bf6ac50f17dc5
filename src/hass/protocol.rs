//! Home Assistant WebSocket API messages.
//!
//! See <https://developers.home-assistant.io/docs/api/websocket> for the
//! message flow: `auth_required` -> `auth` -> `auth_ok`, then commands with
//! an increasing `id` answered by `result` or streamed `event` messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message sent by the client during the auth phase.
#[derive(Debug, Serialize)]
pub(crate) struct AuthMessage<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub access_token: &'a str,
}

impl<'a> AuthMessage<'a> {
    pub fn new(access_token: &'a str) -> Self {
        Self {
            kind: "auth",
            access_token,
        }
    }
}

/// Command sent after authentication.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Command<'a> {
    GetStates,
    GetServices,
    CallService {
        domain: &'a str,
        service: &'a str,
        service_data: &'a Value,
    },
    SubscribeEvents {
        event_type: &'a str,
    },
}

/// A command together with its message id.
#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    pub id: u64,
    #[serde(flatten)]
    pub command: Command<'a>,
}

/// Error details of a failed command.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct ErrorInfo {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Event carried by an `event` message.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EventPayload {
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

/// Any message received from Home Assistant.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Incoming {
    AuthRequired {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthOk {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    Result {
        id: u64,
        success: bool,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<ErrorInfo>,
    },
    Event {
        id: u64,
        event: EventPayload,
    },
    Pong {
        id: u64,
    },
    #[serde(other)]
    Unknown,
}
