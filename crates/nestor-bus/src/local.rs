// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process pub/sub over tokio broadcast channels.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use nestor_core::{AdapterType, HealthStatus, NestorError, PluginAdapter, PubSub, Subscription};
use tokio::sync::broadcast;
use tracing::debug;

/// Single-process bus. Every channel is a broadcast channel created on
/// first use; publishing to a channel nobody listens on is not an error.
#[derive(Clone)]
pub struct LocalBus {
    channels: Arc<DashMap<String, broadcast::Sender<String>>>,
    capacity: usize,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .value()
            .clone()
    }

    /// Hands `payload` to the current subscribers of `channel` and returns
    /// how many received it.
    pub fn deliver(&self, channel: &str, payload: String) -> usize {
        let Some(sender) = self.channels.get(channel).map(|s| s.value().clone()) else {
            debug!(channel, "no subscribers, event dropped");
            return 0;
        };
        sender.send(payload).unwrap_or_default()
    }

    /// Live subscribers on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map(|s| s.receiver_count())
            .unwrap_or_default()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl PluginAdapter for LocalBus {
    fn name(&self) -> &str {
        "local-bus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::PubSub
    }

    async fn health_check(&self) -> Result<HealthStatus, NestorError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), NestorError> {
        self.channels.clear();
        Ok(())
    }
}

#[async_trait]
impl PubSub for LocalBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), NestorError> {
        let delivered = self.deliver(channel, payload.to_string());
        debug!(channel, delivered, "event published");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, NestorError> {
        Ok(Subscription::new(channel, self.sender(channel).subscribe()))
    }
}
