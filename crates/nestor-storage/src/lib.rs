// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for Nestor.
//!
//! One WAL-mode database file holds relational entity tables, document
//! collections, the durable job queue and the shared-bus event log. All
//! access goes through the single `tokio-rusqlite` connection thread, which
//! makes each multi-statement operation atomic with respect to the others.

pub mod database;
pub mod document;
pub mod events;
pub mod migrations;
pub mod queue;
pub mod relational;
mod values;

pub use database::{Database, map_tr_err};
pub use document::{DocumentRecordStore, new_document_id};
pub use events::BusEvent;
pub use queue::{QueueEntry, SqliteQueueBroker};
pub use relational::SqlRecordStore;
