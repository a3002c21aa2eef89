// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Every connection on this process, guests included, and room membership.

use std::collections::HashSet;

use dashmap::DashMap;

use crate::connection::{Connection, ConnectionId};

#[derive(Debug, Default)]
pub struct ConnectionHub {
    connections: DashMap<ConnectionId, Connection>,
    rooms: DashMap<String, HashSet<ConnectionId>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, connection: Connection) {
        self.connections.insert(connection.id().clone(), connection);
    }

    /// Forgets the connection and removes it from every room.
    pub fn disconnect(&self, id: &ConnectionId) -> Option<Connection> {
        self.rooms.retain(|_, members| {
            members.remove(id);
            !members.is_empty()
        });
        self.connections.remove(id).map(|(_, conn)| conn)
    }

    /// Adds a known connection to `room`. Unknown connections are ignored.
    pub fn join(&self, id: &ConnectionId, room: &str) -> bool {
        if !self.connections.contains_key(id) {
            return false;
        }
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(id.clone());
        true
    }

    pub fn leave(&self, id: &ConnectionId, room: &str) {
        let emptied = match self.rooms.get_mut(room) {
            Some(mut members) => {
                members.remove(id);
                members.is_empty()
            }
            None => false,
        };
        if emptied {
            self.rooms.remove_if(room, |_, members| members.is_empty());
        }
    }

    pub fn room_members(&self, room: &str) -> Vec<Connection> {
        let Some(ids) = self.rooms.get(room).map(|members| members.value().clone()) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.connections.get(id).map(|c| c.value().clone()))
            .collect()
    }

    pub fn all(&self) -> Vec<Connection> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn rooms(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn conn() -> Connection {
        let (tx, _rx) = mpsc::channel(1);
        Connection::new(None, tx)
    }

    #[test]
    fn rooms_track_membership() {
        let hub = ConnectionHub::new();
        let (a, b) = (conn(), conn());
        hub.connect(a.clone());
        hub.connect(b.clone());

        assert!(hub.join(a.id(), "R"));
        assert_eq!(hub.room_members("R"), vec![a.clone()]);

        hub.leave(a.id(), "R");
        assert!(hub.room_members("R").is_empty());
        assert_eq!(hub.rooms(), 0);
        assert_eq!(hub.all().len(), 2);
    }

    #[test]
    fn disconnect_leaves_every_room() {
        let hub = ConnectionHub::new();
        let a = conn();
        hub.connect(a.clone());
        hub.join(a.id(), "R1");
        hub.join(a.id(), "R2");

        assert!(hub.disconnect(a.id()).is_some());
        assert!(hub.is_empty());
        assert_eq!(hub.rooms(), 0);
    }

    #[test]
    fn strangers_cannot_join() {
        let hub = ConnectionHub::new();
        assert!(!hub.join(&ConnectionId::new(), "R"));
        assert_eq!(hub.rooms(), 0);
    }
}
