//! # a3s-emitter
//!
//! Broadcast Socket.IO events from any backend process over a shared pub/sub bus.
//!
//! ## Overview
//!
//! Socket.IO servers scaled horizontally with a pub/sub adapter subscribe to
//! channels named `{prefix}#{namespace}#` and `{prefix}#{namespace}#{room}#`.
//! `a3s-emitter` builds the MessagePack envelope those servers expect,
//! `[uid, packet, options]`, and publishes it on the right channels, so
//! processes that hold no socket connections can still reach clients.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_emitter::{Emitter, EmitterConfig, MemoryPublisher};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> a3s_emitter::Result<()> {
//! let mut emitter = Emitter::new(MemoryPublisher::default(), EmitterConfig::default());
//! let cancel = CancellationToken::new();
//!
//! // Everyone in room "lobby" of the default namespace
//! emitter.to("lobby").emit(&cancel, ["announcement", "maintenance at 22:00"]).await?;
//!
//! // Everyone in the "/admin" namespace, volatile
//! emitter.of("/admin").volatile().emit(&cancel, ["tick"]).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Providers
//!
//! - **redis** — Redis `PUBLISH`, compatible with the Socket.IO Redis adapter
//! - **nats** — NATS core publish with the channel as subject
//! - **memory** — In-memory recorder for testing
//!
//! ## Architecture
//!
//! - **Publisher** trait — the only thing an emitter needs from a bus
//! - **Emitter** — targeting builder and envelope publisher
//! - **Codec** — pooled MessagePack encoder
//! - **Envelope** — `(uid, packet, options)` wire tuple

pub mod codec;
pub mod emitter;
pub mod error;
pub mod provider;
pub mod types;

// Re-export core types
pub use codec::{decode_value, from_json, Codec, CompactValue, FieldNames};
pub use emitter::{channel_name, has_binary, Emitter, Session};
pub use error::{EmitterError, Result};
pub use provider::Publisher;
pub use types::{
    DeliveryOptions, EmitterConfig, Envelope, Packet, PacketType, DEFAULT_KEY, DEFAULT_NAMESPACE,
    DEFAULT_UID,
};

// Re-export providers for convenience
pub use provider::memory::{MemoryConfig, MemoryPublisher, PublishedMessage};
pub use provider::nats::{NatsConfig, NatsPublisher};
pub use provider::redis::{RedisConfig, RedisPublisher};

// Payload values are rmpv values
pub use rmpv::Value;
