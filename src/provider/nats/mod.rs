//! NATS core publisher
//!
//! Publishes envelopes as plain NATS messages with the channel name as the
//! subject. Delivery is fire-and-forget, matching Redis `PUBLISH`.

mod client;
mod config;

pub use client::NatsPublisher;
pub use config::NatsConfig;
