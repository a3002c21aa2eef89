// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only event log backing the shared bus. Every process sharing the
//! database file reads it forward from its own cursor.

use rusqlite::params;

use nestor_core::NestorError;

use crate::database::{Database, map_tr_err};

/// One relayed publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEvent {
    pub seq: i64,
    pub channel: String,
    pub payload: String,
}

/// Appends an event and returns its sequence number.
pub async fn append(db: &Database, channel: &str, payload: &str) -> Result<i64, NestorError> {
    let channel = channel.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO bus_events (channel, payload) VALUES (?1, ?2)",
                params![channel, payload],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Events after `seq`, oldest first, at most `limit`.
pub async fn read_after(db: &Database, seq: i64, limit: u32) -> Result<Vec<BusEvent>, NestorError> {
    db.connection()
        .call(move |conn| -> Result<Vec<BusEvent>, rusqlite::Error> {
            let mut stmt = conn.prepare_cached(
                "SELECT seq, channel, payload FROM bus_events WHERE seq > ?1 ORDER BY seq LIMIT ?2",
            )?;
            let events = stmt.query_map(params![seq, limit], |row| {
                Ok(BusEvent {
                    seq: row.get(0)?,
                    channel: row.get(1)?,
                    payload: row.get(2)?,
                })
            })?;
            events.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Highest sequence number written so far (`0` when empty).
pub async fn latest_seq(db: &Database) -> Result<i64, NestorError> {
    db.connection()
        .call(|conn| {
            conn.query_row("SELECT COALESCE(MAX(seq), 0) FROM bus_events", [], |row| {
                row.get(0)
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes events at or below `seq`. Returns the number removed.
pub async fn prune_through(db: &Database, seq: i64) -> Result<u64, NestorError> {
    db.connection()
        .call(move |conn| conn.execute("DELETE FROM bus_events WHERE seq <= ?1", params![seq]))
        .await
        .map_err(map_tr_err)
        .map(|n| n as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cursor_reads_forward() {
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(latest_seq(&db).await.unwrap(), 0);

        let first = append(&db, "a", "1").await.unwrap();
        let second = append(&db, "b", "2").await.unwrap();
        assert!(second > first);

        let events = read_after(&db, first, 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].channel, "b");
        assert_eq!(latest_seq(&db).await.unwrap(), second);

        assert_eq!(prune_through(&db, first).await.unwrap(), 1);
        assert_eq!(read_after(&db, 0, 10).await.unwrap().len(), 1);
    }
}
