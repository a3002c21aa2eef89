// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-process pub/sub relayed through the shared database file.
//!
//! Publishing appends to the `bus_events` log. Each process runs a relay
//! task that reads the log forward from its own cursor and fans events out
//! to its local subscribers, so a publish on any instance reaches every
//! instance sharing the file, the publishing one included.

use std::time::Duration;

use async_trait::async_trait;
use nestor_config::BusConfig;
use nestor_core::{AdapterType, HealthStatus, NestorError, PluginAdapter, PubSub, Subscription};
use nestor_storage::{Database, events};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::local::LocalBus;

/// Events read per relay pass.
const RELAY_BATCH: u32 = 256;

/// Events kept behind the newest one; older entries are pruned.
const RETAINED_EVENTS: i64 = 10_000;

/// Database-relayed bus for multi-instance deployments.
pub struct SharedBus {
    db: Database,
    local: LocalBus,
    relay: CancellationToken,
}

impl SharedBus {
    /// Starts relaying from the current end of the log; events published
    /// before this call are not replayed. The relay stops when `cancel`
    /// fires or the bus shuts down.
    pub async fn start(
        db: Database,
        config: &BusConfig,
        cancel: &CancellationToken,
    ) -> Result<Self, NestorError> {
        let cursor = events::latest_seq(&db).await?;
        let local = LocalBus::new(config.capacity);
        let relay = cancel.child_token();
        let interval = Duration::from_millis(config.poll_interval_ms.max(1));

        tokio::spawn(run_relay(
            db.clone(),
            local.clone(),
            cursor,
            interval,
            relay.clone(),
        ));
        info!(cursor, interval_ms = config.poll_interval_ms, "shared bus relay started");

        Ok(Self { db, local, relay })
    }
}

async fn run_relay(
    db: Database,
    local: LocalBus,
    mut cursor: i64,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        match relay_once(&db, &local, cursor).await {
            Ok(next) => cursor = next,
            Err(err) => error!(error = %err, cursor, "shared bus relay failed"),
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    debug!(cursor, "shared bus relay stopped");
}

/// Delivers every event after `cursor` to local subscribers and returns the
/// new cursor.
pub async fn relay_once(db: &Database, local: &LocalBus, cursor: i64) -> Result<i64, NestorError> {
    let mut cursor = cursor;
    loop {
        let batch = events::read_after(db, cursor, RELAY_BATCH).await?;
        let Some(last) = batch.last().map(|e| e.seq) else {
            return Ok(cursor);
        };
        let full = batch.len() == RELAY_BATCH as usize;
        for event in batch {
            local.deliver(&event.channel, event.payload);
        }
        cursor = last;
        if cursor > RETAINED_EVENTS {
            events::prune_through(db, cursor - RETAINED_EVENTS).await?;
        }
        if !full {
            return Ok(cursor);
        }
    }
}

#[async_trait]
impl PluginAdapter for SharedBus {
    fn name(&self) -> &str {
        "shared-bus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::PubSub
    }

    async fn health_check(&self) -> Result<HealthStatus, NestorError> {
        if self.relay.is_cancelled() {
            return Ok(HealthStatus::Unhealthy("relay stopped".into()));
        }
        events::latest_seq(&self.db).await?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), NestorError> {
        self.relay.cancel();
        self.local.shutdown().await
    }
}

#[async_trait]
impl PubSub for SharedBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), NestorError> {
        let seq = events::append(&self.db, channel, payload)
            .await
            .map_err(|e| NestorError::PubSub {
                message: format!("publish on `{channel}` failed: {e}"),
            })?;
        debug!(channel, seq, "event appended");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, NestorError> {
        self.local.subscribe(channel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn relay_once_advances_the_cursor() {
        let db = Database::open_in_memory().await.unwrap();
        let local = LocalBus::new(8);
        let mut sub = local.subscribe("c").await.unwrap();

        events::append(&db, "c", "one").await.unwrap();
        events::append(&db, "other", "x").await.unwrap();
        let cursor = relay_once(&db, &local, 0).await.unwrap();
        assert_eq!(cursor, 2);
        assert_eq!(sub.recv().await.as_deref(), Some("one"));

        assert_eq!(relay_once(&db, &local, cursor).await.unwrap(), cursor);
    }
}
