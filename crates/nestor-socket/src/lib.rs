// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Socket bookkeeping for Nestor: which connections this process holds,
//! who they belong to, which rooms they joined, and how addressed events
//! reach them from any instance.

pub mod connection;
pub mod contract;
pub mod hub;
pub mod metrics;
pub mod propagator;
pub mod registry;

pub use connection::{Connection, ConnectionId, Identity};
pub use contract::{
    Addressing, EMIT_ALL_CHANNEL, EMIT_AUTHENTICATED_CHANNEL, EMIT_ROLE_CHANNEL,
    EMIT_ROOM_CHANNEL, PROTOCOL_VERSION, SEND_CHANNEL, SocketEvent,
};
pub use hub::ConnectionHub;
pub use propagator::EventPropagator;
pub use registry::SocketRegistry;
