// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message broker traits for background job queues.

use async_trait::async_trait;

use crate::error::NestorError;
use crate::traits::adapter::PluginAdapter;

/// Producer side of a named-queue broker. Publishing is fire-and-forget:
/// `Ok` means the broker accepted the message, not that a worker ran it.
#[async_trait]
pub trait MessageBroker: PluginAdapter {
    async fn publish(&self, queue: &str, payload: &str) -> Result<(), NestorError>;
}

/// A message claimed from a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: i64,
    pub queue: String,
    pub payload: String,
    pub attempts: i64,
}

/// Consumer side of a named-queue broker.
#[async_trait]
pub trait MessageConsumer: PluginAdapter {
    /// Claims the oldest pending message on `queue`, if any.
    async fn receive(&self, queue: &str) -> Result<Option<Delivery>, NestorError>;

    async fn ack(&self, delivery: &Delivery) -> Result<(), NestorError>;

    /// Marks the delivery failed; it is retried until attempts run out.
    async fn nack(&self, delivery: &Delivery, reason: &str) -> Result<(), NestorError>;
}
