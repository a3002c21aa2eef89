// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory brokers for deterministic tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use nestor_core::{
    AdapterType, Delivery, HealthStatus, MessageBroker, MessageConsumer, NestorError,
    PluginAdapter,
};
use tokio::sync::Mutex;

/// Broker that keeps every publish in memory and hands messages out in
/// publish order. Acks and nacks are recorded, never redelivered.
#[derive(Default)]
pub struct RecordingBroker {
    published: Mutex<Vec<(String, String)>>,
    pending: Mutex<HashMap<String, VecDeque<Delivery>>>,
    acked: Mutex<Vec<Delivery>>,
    nacked: Mutex<Vec<(Delivery, String)>>,
    next_id: AtomicI64,
}

impl RecordingBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(queue, payload)` published so far.
    pub async fn published(&self) -> Vec<(String, String)> {
        self.published.lock().await.clone()
    }

    pub async fn acked(&self) -> Vec<Delivery> {
        self.acked.lock().await.clone()
    }

    /// Nacked deliveries with their reasons.
    pub async fn nacked(&self) -> Vec<(Delivery, String)> {
        self.nacked.lock().await.clone()
    }

    /// Messages waiting on `queue`.
    pub async fn depth(&self, queue: &str) -> usize {
        self.pending
            .lock()
            .await
            .get(queue)
            .map(VecDeque::len)
            .unwrap_or_default()
    }
}

#[async_trait]
impl PluginAdapter for RecordingBroker {
    fn name(&self) -> &str {
        "recording-broker"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Broker
    }

    async fn health_check(&self) -> Result<HealthStatus, NestorError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), NestorError> {
        Ok(())
    }
}

#[async_trait]
impl MessageBroker for RecordingBroker {
    async fn publish(&self, queue: &str, payload: &str) -> Result<(), NestorError> {
        self.published
            .lock()
            .await
            .push((queue.to_string(), payload.to_string()));
        let delivery = Delivery {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            queue: queue.to_string(),
            payload: payload.to_string(),
            attempts: 0,
        };
        self.pending
            .lock()
            .await
            .entry(queue.to_string())
            .or_default()
            .push_back(delivery);
        Ok(())
    }
}

#[async_trait]
impl MessageConsumer for RecordingBroker {
    async fn receive(&self, queue: &str) -> Result<Option<Delivery>, NestorError> {
        let mut pending = self.pending.lock().await;
        Ok(pending.get_mut(queue).and_then(VecDeque::pop_front).map(|mut d| {
            d.attempts += 1;
            d
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), NestorError> {
        self.acked.lock().await.push(delivery.clone());
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, reason: &str) -> Result<(), NestorError> {
        self.nacked
            .lock()
            .await
            .push((delivery.clone(), reason.to_string()));
        Ok(())
    }
}

/// Broker that refuses every publish.
#[derive(Debug, Default)]
pub struct FailingBroker;

#[async_trait]
impl PluginAdapter for FailingBroker {
    fn name(&self) -> &str {
        "failing-broker"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Broker
    }

    async fn health_check(&self) -> Result<HealthStatus, NestorError> {
        Ok(HealthStatus::Unhealthy("broker unreachable".into()))
    }

    async fn shutdown(&self) -> Result<(), NestorError> {
        Ok(())
    }
}

#[async_trait]
impl MessageBroker for FailingBroker {
    async fn publish(&self, queue: &str, _payload: &str) -> Result<(), NestorError> {
        Err(NestorError::broker(format!("queue {queue} unavailable")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deliveries_come_back_in_publish_order() {
        let broker = RecordingBroker::new();
        broker.publish("jobs", "a").await.unwrap();
        broker.publish("jobs", "b").await.unwrap();
        broker.publish("other", "c").await.unwrap();

        let first = broker.receive("jobs").await.unwrap().unwrap();
        assert_eq!(first.payload, "a");
        assert_eq!(first.attempts, 1);
        assert_eq!(broker.receive("jobs").await.unwrap().unwrap().payload, "b");
        assert!(broker.receive("jobs").await.unwrap().is_none());
        assert_eq!(broker.depth("other").await, 1);
        assert_eq!(broker.published().await.len(), 3);
    }

    #[tokio::test]
    async fn failing_broker_refuses() {
        let err = FailingBroker.publish("jobs", "{}").await.unwrap_err();
        assert!(err.to_string().contains("jobs unavailable"));
    }
}
