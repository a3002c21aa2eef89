// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity to connection mapping for this process.
//!
//! One identity may hold several connections at once (tabs, devices). The
//! registry only knows connections held by this process; reaching the
//! others is the propagator's job.

use dashmap::DashMap;

use crate::connection::{Connection, ConnectionId};

#[derive(Debug, Default)]
pub struct SocketRegistry {
    entries: DashMap<String, Vec<Connection>>,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `connection` to the identity's set.
    pub fn add(&self, key: &str, connection: Connection) {
        let mut set = self.entries.entry(key.to_string()).or_default();
        if !set.contains(&connection) {
            set.push(connection);
        }
    }

    /// Removes exactly that connection. The identity entry is dropped once
    /// its last connection goes.
    pub fn remove(&self, key: &str, connection: &ConnectionId) {
        let emptied = match self.entries.get_mut(key) {
            Some(mut set) => {
                set.retain(|c| c.id() != connection);
                set.is_empty()
            }
            None => false,
        };
        if emptied {
            self.entries.remove_if(key, |_, set| set.is_empty());
        }
    }

    /// Connections held for `key`; empty when none.
    pub fn get(&self, key: &str) -> Vec<Connection> {
        self.entries
            .get(key)
            .map(|set| set.value().clone())
            .unwrap_or_default()
    }

    /// Every authenticated connection on this process.
    pub fn get_all(&self) -> Vec<Connection> {
        self.entries
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of identities with at least one connection.
    pub fn identities(&self) -> usize {
        self.entries.len()
    }

    pub fn connections(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
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
    fn remove_keeps_the_other_connections() {
        let registry = SocketRegistry::new();
        let (s1, s2) = (conn(), conn());
        registry.add("u1", s1.clone());
        registry.add("u1", s2.clone());
        registry.remove("u1", s1.id());
        assert_eq!(registry.get("u1"), vec![s2]);
    }

    #[test]
    fn last_removal_drops_the_identity() {
        let registry = SocketRegistry::new();
        let s1 = conn();
        registry.add("u1", s1.clone());
        registry.remove("u1", s1.id());
        assert!(registry.get("u1").is_empty());
        assert_eq!(registry.identities(), 0);
    }

    #[test]
    fn get_all_spans_identities() {
        let registry = SocketRegistry::new();
        registry.add("u1", conn());
        registry.add("u2", conn());
        registry.add("u2", conn());
        assert_eq!(registry.get_all().len(), 3);
        assert_eq!(registry.connections(), 3);
        assert_eq!(registry.identities(), 2);
    }

    #[test]
    fn adding_twice_is_idempotent() {
        let registry = SocketRegistry::new();
        let s1 = conn();
        registry.add("u1", s1.clone());
        registry.add("u1", s1);
        assert_eq!(registry.get("u1").len(), 1);
    }

    #[test]
    fn unknown_identity_is_empty() {
        let registry = SocketRegistry::new();
        registry.remove("ghost", &ConnectionId::new());
        assert!(registry.get("ghost").is_empty());
    }
}
