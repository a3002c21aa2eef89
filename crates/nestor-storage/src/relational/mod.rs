// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relational record store on SQLite: one table per entity, envelope
//! columns plus a JSON `data` body.

mod populate;
mod rows;
mod sql;
mod store;

pub use store::SqlRecordStore;
