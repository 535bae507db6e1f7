//! NATS client wrapper — connect, publish, close

use super::config::NatsConfig;
use crate::error::{EmitterError, Result};
use crate::provider::Publisher;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::RwLock;

/// NATS publisher
///
/// Holds the connection until `close`, after which publishes fail with
/// `EmitterError::Closed`.
pub struct NatsPublisher {
    /// NATS client connection (None once closed)
    client: RwLock<Option<async_nats::Client>>,

    /// Configuration
    config: NatsConfig,
}

impl NatsPublisher {
    /// Connect to NATS
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        let client = build_connect_options(&config)
            .connect(&config.url)
            .await
            .map_err(|e| EmitterError::Connection(format!("{}: {}", config.url, e)))?;

        tracing::info!(url = %config.url, "Connected to NATS");

        Ok(Self {
            client: RwLock::new(Some(client)),
            config,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &NatsConfig {
        &self.config
    }

    async fn client(&self) -> Result<async_nats::Client> {
        self.client.read().await.clone().ok_or(EmitterError::Closed)
    }
}

#[async_trait]
impl Publisher for NatsPublisher {
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<()> {
        let client = self.client().await?;
        let size = payload.len();

        client
            .publish(channel.to_string(), payload)
            .await
            .map_err(|e| EmitterError::Transport {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(channel = %channel, bytes = size, "Published to NATS");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let client = self.client.write().await.take();
        if let Some(client) = client {
            // Push out anything still buffered before dropping the connection
            client
                .flush()
                .await
                .map_err(|e| EmitterError::Connection(format!("flush failed: {}", e)))?;
            tracing::info!(url = %self.config.url, "NATS publisher closed");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "nats"
    }

    async fn health(&self) -> Result<bool> {
        let client = self.client.read().await.clone();
        Ok(match client {
            Some(client) => client.flush().await.is_ok(),
            None => false,
        })
    }
}

/// Build NATS connect options from config
fn build_connect_options(config: &NatsConfig) -> async_nats::ConnectOptions {
    let mut opts = async_nats::ConnectOptions::new()
        .connection_timeout(Duration::from_secs(config.connect_timeout_secs))
        .request_timeout(Some(Duration::from_secs(config.request_timeout_secs)));

    if let Some(ref token) = config.token {
        opts = opts.token(token.clone());
    }

    opts
}
