// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements run on tokio-rusqlite's single background thread, so a
//! closure passed to [`tokio_rusqlite::Connection::call`] sees no interleaved
//! writes. Multi-statement operations rely on that and on explicit
//! transactions inside one call.

use nestor_core::NestorError;
use nestor_query::sanitize_identifier;
use tracing::{debug, info};

use crate::migrations;

/// Convert a tokio-rusqlite error into `NestorError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> NestorError {
    NestorError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the shared SQLite database. Cloning shares the connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (or creates) the database file, applies PRAGMAs and runs
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, NestorError> {
        Self::open_with(path, true).await
    }

    /// Like [`open`](Self::open), with WAL optional.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, NestorError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| NestorError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| NestorError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(wal_mode).await?;
        info!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Private in-memory database, used by tests and one-shot commands.
    pub async fn open_in_memory() -> Result<Self, NestorError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| NestorError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), NestorError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                if wal_mode {
                    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                }
                conn.execute_batch(
                    "PRAGMA synchronous = NORMAL;
                     PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = 5000;
                     PRAGMA case_sensitive_like = ON;",
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.conn
            .call(|conn| -> Result<Result<(), NestorError>, rusqlite::Error> {
                Ok(migrations::run_migrations(conn))
            })
            .await
            .map_err(map_tr_err)??;
        Ok(())
    }

    /// The underlying connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Creates the table backing a relational entity if it does not exist.
    ///
    /// Envelope fields are real columns; everything else lives in the JSON
    /// `data` column.
    pub async fn ensure_entity_table(&self, entity: &str) -> Result<(), NestorError> {
        let table = sanitize_identifier(entity);
        if table.is_empty() {
            return Err(NestorError::storage(format!(
                "invalid entity name `{entity}`"
            )));
        }
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                created_by INTEGER,
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_by INTEGER,
                deleted_at TEXT,
                data TEXT NOT NULL DEFAULT '{{}}'
            );
            CREATE INDEX IF NOT EXISTS \"idx_{table}_deleted_at\" ON \"{table}\"(deleted_at);"
        );
        self.conn
            .call(move |conn| conn.execute_batch(&ddl))
            .await
            .map_err(map_tr_err)?;
        debug!(table = %table, "entity table ready");
        Ok(())
    }

    /// Checkpoints the WAL. The connection itself closes when the last
    /// clone is dropped.
    pub async fn close(&self) -> Result<(), NestorError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}
