// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod broker;
pub mod pubsub;
pub mod store;

pub use adapter::PluginAdapter;
pub use broker::{Delivery, MessageBroker, MessageConsumer};
pub use pubsub::{PubSub, Subscription};
pub use store::{RecordPage, RecordStore, RecordTarget, Updated};
