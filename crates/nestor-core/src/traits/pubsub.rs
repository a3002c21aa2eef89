// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pub/sub transport trait used for cross-instance event propagation.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::NestorError;
use crate::traits::adapter::PluginAdapter;

/// A channel-addressed, fire-and-forget message transport.
#[async_trait]
pub trait PubSub: PluginAdapter {
    /// Publishes `payload` to every current subscriber of `channel`,
    /// including subscribers in other processes when the transport spans them.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), NestorError>;

    /// Subscribes to `channel`. Only messages published after this call are
    /// delivered.
    async fn subscribe(&self, channel: &str) -> Result<Subscription, NestorError>;
}

/// Receiving end of a channel subscription.
pub struct Subscription {
    channel: String,
    rx: broadcast::Receiver<String>,
}

impl Subscription {
    pub fn new(channel: impl Into<String>, rx: broadcast::Receiver<String>) -> Self {
        Self {
            channel: channel.into(),
            rx,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next payload, or `None` once the transport is gone. Messages dropped
    /// because this subscriber fell behind are skipped with a warning.
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.channel, skipped, "subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lagged_subscriber_resumes_with_newest() {
        let (tx, rx) = broadcast::channel(2);
        let mut sub = Subscription::new("c", rx);
        for i in 0..4 {
            tx.send(i.to_string()).unwrap();
        }
        assert_eq!(sub.recv().await.as_deref(), Some("2"));
        assert_eq!(sub.recv().await.as_deref(), Some("3"));
        drop(tx);
        assert_eq!(sub.recv().await, None);
    }
}
