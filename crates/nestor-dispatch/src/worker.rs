// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue consumer that runs dispatched jobs.
//!
//! The worker polls its configured queues, decodes each delivery into a
//! [`Job`], checks it was dispatched by this application, hands it to the
//! [`JobHandler`] routed for the queue, reports completion to the audit
//! trail and acknowledges the delivery. Unreadable payloads are failed back
//! to the broker for retry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nestor_config::BrokerConfig;
use nestor_core::{Delivery, Job, MessageConsumer, NestorError};
use nestor_model::ModelService;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatcher::JobDispatcher;
use crate::metrics;

/// Runs jobs taken off one queue.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Runs the job and returns it with a terminal status.
    async fn handle(&self, job: Job) -> Job;
}

#[async_trait]
impl JobHandler for ModelService {
    async fn handle(&self, job: Job) -> Job {
        self.execute(job).await
    }
}

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The job ran; carries its terminal status.
    Ran(String),
    /// Dispatched by another application; acknowledged without running.
    Foreign,
    /// The payload was not a job; failed back for retry.
    Unreadable,
    /// No handler is routed for the queue; failed back for retry.
    Unrouted,
}

/// Consumes configured queues until cancelled.
pub struct JobWorker {
    consumer: Arc<dyn MessageConsumer>,
    dispatcher: JobDispatcher,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    queues: Vec<String>,
    app_id: String,
    poll_interval: Duration,
}

impl JobWorker {
    pub fn new(
        consumer: Arc<dyn MessageConsumer>,
        dispatcher: JobDispatcher,
        config: &BrokerConfig,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            consumer,
            dispatcher,
            handlers: HashMap::new(),
            queues: config.queues.clone(),
            app_id: app_id.into(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    /// Routes jobs from `queue` to `handler`.
    pub fn route(mut self, queue: &str, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(queue.to_string(), handler);
        self
    }

    /// Configured queues that have a handler, in configuration order.
    pub fn routed_queues(&self) -> Vec<&str> {
        self.queues
            .iter()
            .filter(|q| self.handlers.contains_key(q.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Polls until `cancel` fires. Poll failures are logged and retried
    /// after the poll interval.
    pub async fn run(&self, cancel: CancellationToken) {
        for queue in &self.queues {
            if !self.handlers.contains_key(queue) {
                warn!(queue = %queue, "no handler routed, queue will not be consumed");
            }
        }
        info!(queues = ?self.routed_queues(), "job worker started");

        loop {
            if cancel.is_cancelled() {
                break;
            }
            let idle = match self.poll_once().await {
                Ok(handled) => handled == 0,
                Err(err) => {
                    error!(error = %err, "job worker poll failed");
                    true
                }
            };
            if idle {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }
        info!("job worker stopped");
    }

    /// Takes at most one delivery from each routed queue and processes it.
    /// Returns the number of deliveries handled.
    pub async fn poll_once(&self) -> Result<usize, NestorError> {
        let mut handled = 0;
        for queue in self.routed_queues() {
            if let Some(delivery) = self.consumer.receive(queue).await? {
                self.process(&delivery).await?;
                handled += 1;
            }
        }
        Ok(handled)
    }

    /// Runs one delivery to completion and settles it with the broker.
    pub async fn process(&self, delivery: &Delivery) -> Result<Outcome, NestorError> {
        let job: Job = match serde_json::from_str(&delivery.payload) {
            Ok(job) => job,
            Err(err) => {
                self.consumer
                    .nack(delivery, &format!("unreadable job payload: {err}"))
                    .await?;
                return Ok(Outcome::Unreadable);
            }
        };

        if job.app != self.app_id {
            warn!(
                queue = %delivery.queue,
                app = %job.app,
                expected = %self.app_id,
                "job from another application skipped"
            );
            self.consumer.ack(delivery).await?;
            return Ok(Outcome::Foreign);
        }

        let Some(handler) = self.handlers.get(&delivery.queue) else {
            self.consumer
                .nack(delivery, "no handler routed for queue")
                .await?;
            return Ok(Outcome::Unrouted);
        };

        let uid = job.uid.clone().unwrap_or_default();
        debug!(queue = %delivery.queue, uid = %uid, attempt = delivery.attempts, "running job");
        let finished = handler.handle(job).await;
        self.dispatcher.report_completion(&finished).await;

        let status = finished.status.to_string();
        metrics::record_completed(&delivery.queue, &status);
        info!(queue = %delivery.queue, uid = %uid, status = %status, "job finished");
        self.consumer.ack(delivery).await?;
        Ok(Outcome::Ran(status))
    }
}
