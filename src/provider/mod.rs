//! Publisher trait — the bus client seam
//!
//! An emitter never talks to a transport directly. Every backend (Redis,
//! NATS, in-memory) implements `Publisher`, which is the only thing the
//! emitter needs: put bytes on a named channel, and release resources.
//! Connection pooling, retries and failover belong to the backend.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

pub mod memory;
pub mod nats;
pub mod redis;

/// Core trait for pub/sub backends
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish one message on one channel
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<()>;

    /// Release the connection
    ///
    /// Must be idempotent. Publishing after close fails with
    /// `EmitterError::Closed`.
    async fn close(&self) -> Result<()>;

    /// Provider name (e.g., "redis", "nats", "memory")
    fn name(&self) -> &str;

    /// Health check — returns true if the provider can publish
    async fn health(&self) -> Result<bool> {
        Ok(true)
    }
}
