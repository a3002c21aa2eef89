// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handles to live socket connections.

use std::fmt;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::warn;

/// Opaque, process-unique connection id. Clients see it as `socketId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Who an authenticated connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub role_id: Option<i64>,
}

impl Identity {
    /// Registry key for this identity.
    pub fn key(&self) -> String {
        self.user_id.to_string()
    }

    /// Room every connection of this role joins.
    pub fn role_room(&self) -> Option<String> {
        self.role_id.map(|role| format!("ROLE_{role}"))
    }
}

/// A live connection: its id, its identity (if authenticated) and the
/// outbound frame queue drained by the connection's writer task.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    identity: Option<Identity>,
    outbound: mpsc::Sender<String>,
}

impl Connection {
    pub fn new(identity: Option<Identity>, outbound: mpsc::Sender<String>) -> Self {
        Self {
            id: ConnectionId::new(),
            identity,
            outbound,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity
    }

    /// Queues `{"event": event, "data": data}` for the client. Returns
    /// `false` when the frame was dropped (closed or saturated connection).
    pub fn emit(&self, event: &str, data: &Value) -> bool {
        self.send_frame(json!({"event": event, "data": data}).to_string())
    }

    /// Queues an already-encoded frame.
    pub fn send_frame(&self, frame: String) -> bool {
        match self.outbound.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(socket_id = %self.id, "outbound queue full, frame dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}
