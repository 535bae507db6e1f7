//! In-memory publisher
//!
//! Records every published message instead of sending it anywhere. Useful
//! for tests and for single-process setups that inspect emitted envelopes.

use super::Publisher;
use crate::error::{EmitterError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A message captured by [`MemoryPublisher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub channel: String,
    pub payload: Bytes,
}

/// Configuration for the in-memory publisher
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    /// Channels whose publishes fail with a transport error
    pub failing_channels: HashSet<String>,
}

/// In-memory publisher
///
/// Clones share the same message log, so a test can hand one clone to an
/// emitter and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    messages: Arc<RwLock<Vec<PublishedMessage>>>,
    config: Arc<MemoryConfig>,
    closed: Arc<AtomicBool>,
}

impl MemoryPublisher {
    /// Create a publisher with custom configuration
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            messages: Arc::new(RwLock::new(Vec::new())),
            config: Arc::new(config),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a publisher whose publishes to `channels` fail
    pub fn failing_on<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(MemoryConfig {
            failing_channels: channels.into_iter().map(Into::into).collect(),
        })
    }

    /// All messages, in publish order
    pub async fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.read().await.clone()
    }

    /// Messages published on one channel
    pub async fn messages_on(&self, channel: &str) -> Vec<PublishedMessage> {
        self.messages
            .read()
            .await
            .iter()
            .filter(|m| m.channel == channel)
            .cloned()
            .collect()
    }

    /// Drop all recorded messages
    pub async fn clear(&self) {
        self.messages.write().await.clear();
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<()> {
        if self.is_closed() {
            return Err(EmitterError::Closed);
        }
        if self.config.failing_channels.contains(channel) {
            return Err(EmitterError::Transport {
                channel: channel.to_string(),
                reason: "simulated failure".to_string(),
            });
        }

        self.messages.write().await.push(PublishedMessage {
            channel: channel.to_string(),
            payload,
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }

    async fn health(&self) -> Result<bool> {
        Ok(!self.is_closed())
    }
}
