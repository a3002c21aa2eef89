// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket gateway for Nestor.
//!
//! Accepts client sockets on `/ws`, authenticates them at handshake, and
//! wires each one into the process's [`SocketRegistry`] and
//! [`ConnectionHub`] so propagated events can reach it.
//!
//! [`SocketRegistry`]: nestor_socket::SocketRegistry
//! [`ConnectionHub`]: nestor_socket::ConnectionHub

pub mod auth;
pub mod handlers;
pub mod server;
pub mod ws;

pub use auth::{Handshake, TokenAuthenticator};
pub use server::{GatewayState, MetricsRender, router, serve, start_server};
