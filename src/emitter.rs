//! Socket.IO emitter
//!
//! `Emitter` accumulates targeting (rooms, namespace, flags) through chained
//! calls, then `emit` builds the packet, encodes the envelope and publishes
//! it on the channels Socket.IO servers subscribe to:
//!
//! - `{prefix}#{nsp}#` when no room is targeted
//! - `{prefix}#{nsp}#{room}#` once per targeted room
//!
//! ```rust
//! use a3s_emitter::{Emitter, EmitterConfig, MemoryPublisher};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> a3s_emitter::Result<()> {
//! let mut emitter = Emitter::new(MemoryPublisher::default(), EmitterConfig::default());
//! let cancel = CancellationToken::new();
//!
//! emitter
//!     .to("lobby")
//!     .of("/chat")
//!     .emit(&cancel, ["message", "hello"])
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! An emitter is a builder with mutable state: share it across tasks only
//! behind a lock, or give each task its own emitter over a shared publisher.

use crate::codec::{Codec, FieldNames};
use crate::error::{EmitterError, Result};
use crate::provider::Publisher;
use crate::types::{
    DeliveryOptions, EmitterConfig, Envelope, Packet, PacketType, DEFAULT_NAMESPACE, NSP_FLAG,
};
use bytes::Bytes;
use rmpv::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Targeting accumulated since the last emission
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    rooms: Vec<String>,
    flags: BTreeMap<String, Value>,
}

impl Session {
    /// Add a room unless already present
    pub fn add_room(&mut self, room: impl Into<String>) {
        let room = room.into();
        if !self.rooms.contains(&room) {
            self.rooms.push(room);
        }
    }

    /// Set a delivery flag
    pub fn set_flag(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.flags.insert(name.into(), value.into());
    }

    /// Pending rooms, in first-seen order
    pub fn rooms(&self) -> &[String] {
        &self.rooms
    }

    /// Pending flags, including the namespace override if set
    pub fn flags(&self) -> &BTreeMap<String, Value> {
        &self.flags
    }

    /// Pending namespace override
    pub fn namespace(&self) -> Option<&str> {
        self.flags.get(NSP_FLAG).and_then(Value::as_str)
    }

    /// Remove the namespace override, falling back to `/`
    pub fn take_namespace(&mut self) -> String {
        match self.flags.remove(NSP_FLAG) {
            Some(Value::String(nsp)) => nsp.into_str().unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            _ => DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// No pending rooms or flags
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty() && self.flags.is_empty()
    }

    /// Drop all pending targeting
    pub fn clear(&mut self) {
        self.rooms.clear();
        self.flags.clear();
    }
}

/// Socket.IO-compatible emitter over a pluggable publisher
pub struct Emitter {
    /// Bus client (None once closed)
    publisher: Option<Arc<dyn Publisher>>,

    /// Whether `close` also closes the publisher
    owns_publisher: bool,

    codec: &'static Codec,

    /// Channel prefix
    prefix: String,

    /// Sender identity, resolved once at construction
    uid: String,

    session: Session,
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("publisher", &self.publisher.as_ref().map(|p| p.name()))
            .field("prefix", &self.prefix)
            .field("uid", &self.uid)
            .field("session", &self.session)
            .finish()
    }
}

impl Emitter {
    /// Create an emitter that owns its publisher
    pub fn new(publisher: impl Publisher + 'static, config: EmitterConfig) -> Self {
        Self::build(Arc::new(publisher), true, config)
    }

    /// Create an emitter over a publisher shared with other emitters
    ///
    /// Closing this emitter drops its handle but leaves the publisher open.
    pub fn with_shared(publisher: Arc<dyn Publisher>, config: EmitterConfig) -> Self {
        Self::build(publisher, false, config)
    }

    fn build(publisher: Arc<dyn Publisher>, owns_publisher: bool, config: EmitterConfig) -> Self {
        let uid = config.resolve_uid();
        let prefix = config.prefix().to_string();

        tracing::debug!(
            provider = publisher.name(),
            prefix = %prefix,
            uid = %uid,
            owns_publisher,
            "Emitter created"
        );

        Self {
            publisher: Some(publisher),
            owns_publisher,
            codec: Codec::global(),
            prefix,
            uid,
            session: Session::default(),
        }
    }

    /// Target a room
    pub fn to(&mut self, room: impl Into<String>) -> &mut Self {
        self.session.add_room(room);
        self
    }

    /// Target a room (alias of [`to`](Self::to))
    pub fn in_room(&mut self, room: impl Into<String>) -> &mut Self {
        self.to(room)
    }

    /// Target a namespace; the last call before `emit` wins
    pub fn of(&mut self, namespace: impl Into<String>) -> &mut Self {
        let namespace: String = namespace.into();
        self.session.set_flag(NSP_FLAG, namespace);
        self
    }

    /// Mark the payload as JSON-only
    pub fn json(&mut self) -> &mut Self {
        self.session.set_flag("json", true);
        self
    }

    /// Allow the message to be dropped for clients that are not ready
    pub fn volatile(&mut self) -> &mut Self {
        self.session.set_flag("volatile", true);
        self
    }

    /// Deliver to everyone except the originating socket
    pub fn broadcast(&mut self) -> &mut Self {
        self.session.set_flag("broadcast", true);
        self
    }

    /// Discard pending targeting without emitting
    pub fn reset(&mut self) -> &mut Self {
        self.session.clear();
        self
    }

    /// Build, encode and publish one event
    ///
    /// Each item is encoded with its serde field names, so a
    /// `#[serde(rename = "userId")]` field arrives as `userId`.
    ///
    /// Pending targeting is drained before anything else happens, so it
    /// never carries over to the next emission, whatever the outcome.
    /// Every room is attempted even if an earlier one fails; the first
    /// failure is returned.
    pub async fn emit<I>(&mut self, cancel: &CancellationToken, data: I) -> Result<&mut Self>
    where
        I: IntoIterator,
        I::Item: Serialize,
    {
        let mut session = std::mem::take(&mut self.session);
        let publisher = self.publisher.clone().ok_or(EmitterError::Closed)?;

        let codec = self.codec;
        let data = data
            .into_iter()
            .map(|item| codec.to_value(&item))
            .collect::<Result<Vec<Value>>>()?;
        let kind = if has_binary(&data) {
            PacketType::BinaryEvent
        } else {
            PacketType::Event
        };
        let namespace = session.take_namespace();
        let channel = channel_name(&self.prefix, &namespace, None);

        let envelope = Envelope(
            self.uid.clone(),
            Packet {
                kind,
                data,
                namespace,
            },
            DeliveryOptions {
                rooms: session.rooms,
                flags: session.flags,
            },
        );
        let payload = self.codec.encode(&envelope, FieldNames::Compatible)?;

        let rooms = &envelope.options().rooms;
        tracing::debug!(
            provider = publisher.name(),
            nsp = %envelope.packet().namespace,
            packet_type = kind.code(),
            rooms = rooms.len(),
            bytes = payload.len(),
            "Emitting event"
        );

        let first_error = if rooms.is_empty() {
            publish_with_cancel(publisher.as_ref(), cancel, &channel, payload)
                .await
                .err()
        } else {
            let mut first_error = None;
            for room in rooms {
                let room_channel = format!("{}{}#", channel, room);
                if let Err(e) =
                    publish_with_cancel(publisher.as_ref(), cancel, &room_channel, payload.clone())
                        .await
                {
                    tracing::warn!(channel = %room_channel, error = %e, "Failed to publish to room");
                    first_error.get_or_insert(e);
                }
            }
            first_error
        };

        match first_error {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }

    /// Release the publisher handle; later emissions fail with `EmitterError::Closed`
    ///
    /// An owned publisher is closed too. A shared one stays open for the
    /// other emitters.
    pub async fn close(&mut self) -> Result<()> {
        match self.publisher.take() {
            Some(publisher) if self.owns_publisher => publisher.close().await,
            _ => Ok(()),
        }
    }

    /// Channel prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Sender identity
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Pending targeting
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Pending rooms
    pub fn rooms(&self) -> &[String] {
        self.session.rooms()
    }

    /// Pending flags
    pub fn flags(&self) -> &BTreeMap<String, Value> {
        self.session.flags()
    }

    /// Pending namespace override
    pub fn namespace(&self) -> Option<&str> {
        self.session.namespace()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.publisher.is_none()
    }

    /// Channel an emission to `namespace` (and optionally `room`) is published on
    pub fn channel_for(&self, namespace: &str, room: Option<&str>) -> String {
        channel_name(&self.prefix, namespace, room)
    }
}

/// `{prefix}#{nsp}#` or `{prefix}#{nsp}#{room}#`
pub fn channel_name(prefix: &str, namespace: &str, room: Option<&str>) -> String {
    match room {
        Some(room) => format!("{}#{}#{}#", prefix, namespace, room),
        None => format!("{}#{}#", prefix, namespace),
    }
}

/// Whether any payload item contains raw binary, through arrays and map values
///
/// Scalars of any other type are non-binary and only end their own branch.
pub fn has_binary(data: &[Value]) -> bool {
    data.iter().any(contains_binary)
}

fn contains_binary(value: &Value) -> bool {
    match value {
        Value::Binary(_) => true,
        Value::Array(items) => items.iter().any(contains_binary),
        Value::Map(entries) => entries.iter().any(|(_, v)| contains_binary(v)),
        _ => false,
    }
}

async fn publish_with_cancel(
    publisher: &dyn Publisher,
    cancel: &CancellationToken,
    channel: &str,
    payload: Bytes,
) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EmitterError::Cancelled {
            channel: channel.to_string(),
        }),
        result = publisher.publish(channel, payload) => result,
    }
}
