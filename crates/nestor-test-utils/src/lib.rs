// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Nestor integration tests.
//!
//! Provides in-memory brokers and a harness that assembles a dispatcher,
//! a model service and a bus over a temp SQLite file, so tests run without
//! external services.
//!
//! # Components
//!
//! - [`RecordingBroker`] - In-memory broker that keeps every publish
//! - [`FailingBroker`] - Broker whose publishes always fail
//! - [`TestHarness`] - Temp database, `users` model, audit store and dispatcher

pub mod brokers;
pub mod harness;

pub use brokers::{FailingBroker, RecordingBroker};
pub use harness::TestHarness;
