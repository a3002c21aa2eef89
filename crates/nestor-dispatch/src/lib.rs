// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fire-and-forget job dispatch for Nestor.
//!
//! [`JobDispatcher`] publishes jobs onto named broker queues and keeps an
//! audit record per job, correlated by the job's `uid`. [`JobWorker`] is the
//! consuming side: it runs each job through a [`JobHandler`] and writes the
//! outcome back into the audit record.

pub mod dispatcher;
pub mod metrics;
pub mod worker;

pub use dispatcher::{AUDIT_COLLECTION, JobDispatcher};
pub use worker::{JobHandler, JobWorker, Outcome};
