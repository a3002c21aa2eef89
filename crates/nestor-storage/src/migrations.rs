// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! Entity tables are not migrated here: they are created on demand by
//! [`Database::ensure_entity_table`](crate::Database::ensure_entity_table)
//! because the set of entities is decided by the embedding service.

use nestor_core::NestorError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Run all pending migrations against the given connection.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), NestorError> {
    embedded::migrations::runner()
        .run(conn)
        .map_err(|e| NestorError::Storage {
            source: Box::new(e),
        })?;
    Ok(())
}
