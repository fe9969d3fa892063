//! Discord gateway envelope: `{op, d, s, t}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;

pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

pub mod event {
    pub const READY: &str = "READY";
    pub const MESSAGE_CREATE: &str = "MESSAGE_CREATE";
    pub const THREAD_CREATE: &str = "THREAD_CREATE";
}

/// One inbound gateway frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayFrame {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

impl GatewayFrame {
    pub fn event_name(&self) -> Option<&str> {
        self.t.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HelloPayload {
    /// Milliseconds.
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadyUser {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadyPayload {
    pub session_id: String,
    pub user: ReadyUser,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ThreadCreatePayload {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub guild_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub intents: u64,
    pub properties: ConnectionProperties,
}

/// Control frames this client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Heartbeat(Option<u64>),
    Identify(IdentifyPayload),
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    op: u8,
    d: &'a T,
}

impl OutboundFrame {
    pub fn op(&self) -> u8 {
        match self {
            Self::Heartbeat(_) => opcode::HEARTBEAT,
            Self::Identify(_) => opcode::IDENTIFY,
        }
    }

    /// Serialize into the wire envelope `{op, d}`.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let op = self.op();
        match self {
            Self::Heartbeat(seq) => serde_json::to_string(&Envelope { op, d: seq }),
            Self::Identify(payload) => serde_json::to_string(&Envelope { op, d: payload }),
        }
    }
}

pub fn decode_frame(text: &str) -> Result<GatewayFrame, GatewayError> {
    serde_json::from_str(text).map_err(|e| GatewayError::MalformedFrame(e.to_string()))
}

/// Interpret a frame's `d` as a typed payload.
pub fn payload<T: serde::de::DeserializeOwned>(frame: &GatewayFrame) -> Result<T, GatewayError> {
    T::deserialize(&frame.d).map_err(|e| {
        GatewayError::MalformedFrame(format!("op {} payload: {e}", frame.op))
    })
}
