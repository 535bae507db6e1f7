//! Wire types for the Socket.IO emitter envelope
//!
//! Field names follow the Socket.IO adapter protocol (`type`, `data`,
//! `nsp`, `rooms`, `flags`), so envelopes must be encoded with
//! [`FieldNames::Compatible`](crate::codec::FieldNames::Compatible).

use crate::codec::serialize_compact_seq;
use rmpv::Value;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Channel prefix used when none is configured
pub const DEFAULT_KEY: &str = "socket.io";

/// Sender identity used when neither config nor environment provide one
pub const DEFAULT_UID: &str = "emitter";

/// Root namespace
pub const DEFAULT_NAMESPACE: &str = "/";

/// Pending flag carrying the namespace override until the packet is built
pub const NSP_FLAG: &str = "nsp";

/// Environment variable holding the host identity
pub const HOSTNAME_ENV: &str = "HOSTNAME";

/// Socket.IO packet type
///
/// Codes come from socket.io-parser: `EVENT = 2`, `BINARY_EVENT = 5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Event,
    BinaryEvent,
}

impl PacketType {
    /// Protocol integer code
    pub fn code(self) -> u8 {
        match self {
            PacketType::Event => 2,
            PacketType::BinaryEvent => 5,
        }
    }

    /// Parse a protocol integer code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            2 => Some(PacketType::Event),
            5 => Some(PacketType::BinaryEvent),
            _ => None,
        }
    }
}

impl Serialize for PacketType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for PacketType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        PacketType::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown packet type {}", code)))
    }
}

/// The logical event: type, payload and namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    #[serde(rename = "type")]
    pub kind: PacketType,

    #[serde(serialize_with = "serialize_compact_seq")]
    pub data: Vec<Value>,

    #[serde(rename = "nsp")]
    pub namespace: String,
}

/// Per-emission targeting metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOptions {
    /// Target rooms, in first-seen order
    pub rooms: Vec<String>,

    /// Delivery flags (`json`, `volatile`, `broadcast`)
    pub flags: BTreeMap<String, Value>,
}

/// The unit published on the bus: `[uid, packet, options]`
///
/// A tuple struct so it is always written as a three-element array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope(pub String, pub Packet, pub DeliveryOptions);

impl Envelope {
    pub fn uid(&self) -> &str {
        &self.0
    }

    pub fn packet(&self) -> &Packet {
        &self.1
    }

    pub fn options(&self) -> &DeliveryOptions {
        &self.2
    }
}

/// Emitter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitterConfig {
    /// Channel prefix (`socket.io` when empty)
    #[serde(default = "default_key")]
    pub key: String,

    /// Sender identity; resolved from `HOSTNAME` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

fn default_key() -> String {
    DEFAULT_KEY.to_string()
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            uid: None,
        }
    }
}

impl EmitterConfig {
    /// Config with a custom channel prefix
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Set an explicit sender identity
    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Effective channel prefix
    pub fn prefix(&self) -> &str {
        if self.key.is_empty() {
            DEFAULT_KEY
        } else {
            &self.key
        }
    }

    /// Resolve the sender identity: explicit uid, then `HOSTNAME`, then `"emitter"`
    pub fn resolve_uid(&self) -> String {
        if let Some(uid) = self.uid.as_deref().filter(|u| !u.is_empty()) {
            return uid.to_string();
        }
        std::env::var(HOSTNAME_ENV)
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_UID.to_string())
    }
}
