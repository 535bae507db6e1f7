//! Redis publisher
//!
//! Socket.IO's Redis adapter subscribes to `PUBLISH` channels, so this is the
//! wire-compatible default backend.

use super::Publisher;
use crate::error::{EmitterError, Result};
use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Configuration for the Redis publisher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisConfig {
    /// Connection URL (e.g., redis://localhost:6379)
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

/// Redis `PUBLISH` publisher
///
/// Uses a `ConnectionManager`, which reconnects on its own; this type adds
/// no retries of its own.
pub struct RedisPublisher {
    conn: RwLock<Option<ConnectionManager>>,
    url: String,
}

impl RedisPublisher {
    /// Connect to Redis
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| EmitterError::Config(format!("invalid redis url '{}': {}", config.url, e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| EmitterError::Connection(format!("{}: {}", config.url, e)))?;

        tracing::info!(url = %config.url, "Connected to Redis for publishing");

        Ok(Self::from_connection(conn, config.url))
    }

    /// Wrap an existing connection manager
    pub fn from_connection(conn: ConnectionManager, url: impl Into<String>) -> Self {
        Self {
            conn: RwLock::new(Some(conn)),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<()> {
        let mut conn = self.conn.read().await.clone().ok_or(EmitterError::Closed)?;

        let receivers: u64 = conn
            .publish(channel, &payload[..])
            .await
            .map_err(|e| EmitterError::Transport {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(
            channel = %channel,
            bytes = payload.len(),
            receivers,
            "Published to Redis"
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.conn.write().await.take().is_some() {
            tracing::info!(url = %self.url, "Redis publisher closed");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "redis"
    }

    async fn health(&self) -> Result<bool> {
        let conn = self.conn.read().await.clone();
        let Some(mut conn) = conn else {
            return Ok(false);
        };
        let pong: ::redis::RedisResult<String> = ::redis::cmd("PING").query_async(&mut conn).await;
        Ok(pong.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        assert_eq!(RedisConfig::default().url, "redis://127.0.0.1:6379");
    }

    #[tokio::test]
    async fn test_invalid_url_is_config_error() {
        let result = RedisPublisher::connect(RedisConfig {
            url: "not a url".to_string(),
        })
        .await;
        assert!(matches!(result, Err(EmitterError::Config(_))));
    }
}
