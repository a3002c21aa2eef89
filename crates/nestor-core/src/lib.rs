// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Nestor job/data-access layer.
//!
//! This crate provides the job envelope, the portable query DSL, error
//! types, and the adapter traits that storage engines, brokers and pub/sub
//! transports implement.

pub mod action;
pub mod error;
pub mod job;
pub mod options;
pub mod traits;
pub mod types;

pub use action::{Action, Phase};
pub use error::{JobError, NestorError};
pub use job::{Job, JobResponse, JobStatus, Owner, Record};
pub use options::{JobOption, LockMode, SortDirection, SortKey};
pub use types::{AdapterType, HealthStatus, RecordId, StorageEngine};

pub use traits::{
    Delivery, MessageBroker, MessageConsumer, PluginAdapter, PubSub, RecordPage, RecordStore,
    RecordTarget, Subscription, Updated,
};
