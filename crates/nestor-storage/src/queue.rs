// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable job queue: crash-safe `pending -> processing -> completed|failed`
//! with bounded retries, and the broker adapter built on it.

use async_trait::async_trait;
use nestor_core::{
    AdapterType, Delivery, HealthStatus, MessageBroker, MessageConsumer, NestorError,
    PluginAdapter,
};
use rusqlite::params;
use tracing::{debug, warn};

use crate::database::{Database, map_tr_err};

/// Lease a claimed entry holds before another consumer may reclaim it.
const LEASE: &str = "+5 minutes";

/// A row of the `queue` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub status: String,
    pub attempts: i64,
    pub max_attempts: i64,
    pub last_error: Option<String>,
}

impl From<QueueEntry> for Delivery {
    fn from(entry: QueueEntry) -> Self {
        Delivery {
            id: entry.id,
            queue: entry.queue_name,
            payload: entry.payload,
            attempts: entry.attempts,
        }
    }
}

/// Enqueue a new item. Returns the auto-generated queue entry ID.
pub async fn enqueue(
    db: &Database,
    queue_name: &str,
    payload: &str,
    max_attempts: u32,
) -> Result<i64, NestorError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO queue (queue_name, payload, max_attempts) VALUES (?1, ?2, ?3)",
                params![queue_name, payload, max_attempts],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Claims the oldest pending entry of the named queue, or a processing
/// entry whose lease has expired (its consumer died). Returns `None` when
/// nothing is claimable.
pub async fn dequeue(db: &Database, queue_name: &str) -> Result<Option<QueueEntry>, NestorError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<QueueEntry>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let result = tx.query_row(
                "SELECT id, queue_name, payload, status, attempts, max_attempts, last_error
                 FROM queue
                 WHERE queue_name = ?1
                   AND (status = 'pending'
                        OR (status = 'processing'
                            AND locked_until < strftime('%Y-%m-%dT%H:%M:%fZ', 'now')))
                 ORDER BY id ASC
                 LIMIT 1",
                params![queue_name],
                |row| {
                    Ok(QueueEntry {
                        id: row.get(0)?,
                        queue_name: row.get(1)?,
                        payload: row.get(2)?,
                        status: row.get(3)?,
                        attempts: row.get(4)?,
                        max_attempts: row.get(5)?,
                        last_error: row.get(6)?,
                    })
                },
            );

            match result {
                Ok(entry) => {
                    tx.execute(
                        "UPDATE queue SET status = 'processing',
                         locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?2),
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?1",
                        params![entry.id, LEASE],
                    )?;
                    tx.commit()?;
                    Ok(Some(QueueEntry {
                        status: "processing".to_string(),
                        ..entry
                    }))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Marks an entry completed.
pub async fn ack(db: &Database, id: i64) -> Result<(), NestorError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET status = 'completed', locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Records a failed attempt. The entry goes back to `pending` until
/// `max_attempts` is reached, then becomes `failed`.
pub async fn fail(db: &Database, id: i64, reason: &str) -> Result<(), NestorError> {
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET
                     attempts = attempts + 1,
                     status = CASE WHEN attempts + 1 >= max_attempts THEN 'failed' ELSE 'pending' END,
                     last_error = ?2,
                     locked_until = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id, reason],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Number of entries per status for one queue.
pub async fn depth(db: &Database, queue_name: &str, status: &str) -> Result<u64, NestorError> {
    let queue_name = queue_name.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM queue WHERE queue_name = ?1 AND status = ?2",
                params![queue_name, status],
                |row| row.get::<_, i64>(0),
            )
        })
        .await
        .map_err(map_tr_err)
        .map(|n| u64::try_from(n).unwrap_or_default())
}

/// Message broker over the durable queue table.
#[derive(Clone)]
pub struct SqliteQueueBroker {
    db: Database,
    max_attempts: u32,
}

impl SqliteQueueBroker {
    pub fn new(db: Database, max_attempts: u32) -> Self {
        Self { db, max_attempts }
    }
}

#[async_trait]
impl PluginAdapter for SqliteQueueBroker {
    fn name(&self) -> &str {
        "sqlite-queue"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Broker
    }

    async fn health_check(&self) -> Result<HealthStatus, NestorError> {
        depth(&self.db, "", "pending").await?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), NestorError> {
        Ok(())
    }
}

#[async_trait]
impl MessageBroker for SqliteQueueBroker {
    async fn publish(&self, queue: &str, payload: &str) -> Result<(), NestorError> {
        let id = enqueue(&self.db, queue, payload, self.max_attempts)
            .await
            .map_err(|e| NestorError::Broker {
                message: format!("enqueue on `{queue}` failed"),
                source: Some(Box::new(e)),
            })?;
        debug!(queue, id, "job enqueued");
        Ok(())
    }
}

#[async_trait]
impl MessageConsumer for SqliteQueueBroker {
    async fn receive(&self, queue: &str) -> Result<Option<Delivery>, NestorError> {
        Ok(dequeue(&self.db, queue).await?.map(Delivery::from))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), NestorError> {
        ack(&self.db, delivery.id).await
    }

    async fn nack(&self, delivery: &Delivery, reason: &str) -> Result<(), NestorError> {
        warn!(queue = %delivery.queue, id = delivery.id, reason, "delivery failed");
        fail(&self.db, delivery.id, reason).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("queue.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    async fn status_and_attempts(db: &Database, id: i64) -> (String, i64) {
        db.connection()
            .call(move |conn| -> Result<(String, i64), rusqlite::Error> {
                conn.query_row(
                    "SELECT status, attempts FROM queue WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn enqueue_and_dequeue_lifecycle() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "jobs", r#"{"app":"api"}"#, 3).await.unwrap();
        let entry = dequeue(&db, "jobs").await.unwrap().unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.status, "processing");
        assert_eq!(entry.payload, r#"{"app":"api"}"#);

        assert!(dequeue(&db, "jobs").await.unwrap().is_none());

        ack(&db, id).await.unwrap();
        assert_eq!(status_and_attempts(&db, id).await.0, "completed");
    }

    #[tokio::test]
    async fn fail_retries_then_gives_up() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "jobs", "payload", 2).await.unwrap();

        dequeue(&db, "jobs").await.unwrap().unwrap();
        fail(&db, id, "boom").await.unwrap();
        assert_eq!(status_and_attempts(&db, id).await, ("pending".into(), 1));

        let retried = dequeue(&db, "jobs").await.unwrap().unwrap();
        assert_eq!(retried.last_error.as_deref(), Some("boom"));
        fail(&db, id, "boom again").await.unwrap();
        assert_eq!(status_and_attempts(&db, id).await, ("failed".into(), 2));
        assert!(dequeue(&db, "jobs").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_lease_is_reclaimed() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "jobs", "payload", 3).await.unwrap();
        dequeue(&db, "jobs").await.unwrap().unwrap();

        db.connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE queue SET locked_until = '2000-01-01T00:00:00.000Z' WHERE id = ?1",
                    params![id],
                )
            })
            .await
            .unwrap();

        let reclaimed = dequeue(&db, "jobs").await.unwrap().unwrap();
        assert_eq!(reclaimed.id, id);
    }

    #[tokio::test]
    async fn queues_are_isolated() {
        let (db, _dir) = setup_db().await;
        enqueue(&db, "mail", "m", 3).await.unwrap();
        assert!(dequeue(&db, "jobs").await.unwrap().is_none());
        assert_eq!(depth(&db, "mail", "pending").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn broker_round_trip() {
        let (db, _dir) = setup_db().await;
        let broker = SqliteQueueBroker::new(db.clone(), 3);
        broker.publish("jobs", "{}").await.unwrap();

        let delivery = broker.receive("jobs").await.unwrap().unwrap();
        assert_eq!(delivery.queue, "jobs");
        assert_eq!(delivery.attempts, 0);
        broker.ack(&delivery).await.unwrap();
        assert_eq!(depth(&db, "jobs", "completed").await.unwrap(), 1);
        assert_eq!(broker.adapter_type(), AdapterType::Broker);
    }

    #[tokio::test]
    async fn concurrent_publishers_all_land() {
        let (db, _dir) = setup_db().await;
        let broker = SqliteQueueBroker::new(db.clone(), 3);
        let mut handles = Vec::new();
        for i in 0..10 {
            let broker = broker.clone();
            handles.push(tokio::spawn(async move {
                broker.publish("jobs", &format!(r#"{{"n":{i}}}"#)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(depth(&db, "jobs", "pending").await.unwrap(), 10);
    }
}
