// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire contract between propagating instances.
//!
//! One pub/sub channel per addressing kind, each carrying a JSON
//! [`SocketEvent`]. Channel names and the payload carry a version; a
//! consumer drops payloads whose version it does not speak.

use nestor_core::RecordId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload version this build produces and accepts.
pub const PROTOCOL_VERSION: u32 = 1;

pub const SEND_CHANNEL: &str = "nestor.socket.v1.send";
pub const EMIT_ALL_CHANNEL: &str = "nestor.socket.v1.emit_all";
pub const EMIT_ROOM_CHANNEL: &str = "nestor.socket.v1.emit_room";
pub const EMIT_AUTHENTICATED_CHANNEL: &str = "nestor.socket.v1.emit_authenticated";
pub const EMIT_ROLE_CHANNEL: &str = "nestor.socket.v1.emit_role";

/// Who an event is for; selects the channel it travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Addressing {
    /// One user's connections, optionally minus the originating one.
    Send,
    /// Every connection, guests included.
    EmitAll,
    /// Connections joined to a room.
    EmitRoom,
    /// Every authenticated connection.
    EmitAuthenticated,
    /// Authenticated connections of one role.
    EmitRole,
}

impl Addressing {
    pub const ALL: [Addressing; 5] = [
        Addressing::Send,
        Addressing::EmitAll,
        Addressing::EmitRoom,
        Addressing::EmitAuthenticated,
        Addressing::EmitRole,
    ];

    pub fn channel(self) -> &'static str {
        match self {
            Addressing::Send => SEND_CHANNEL,
            Addressing::EmitAll => EMIT_ALL_CHANNEL,
            Addressing::EmitRoom => EMIT_ROOM_CHANNEL,
            Addressing::EmitAuthenticated => EMIT_AUTHENTICATED_CHANNEL,
            Addressing::EmitRole => EMIT_ROLE_CHANNEL,
        }
    }

    /// Short name used in metric labels.
    pub fn label(self) -> &'static str {
        match self {
            Addressing::Send => "send",
            Addressing::EmitAll => "emit_all",
            Addressing::EmitRoom => "emit_room",
            Addressing::EmitAuthenticated => "emit_authenticated",
            Addressing::EmitRole => "emit_role",
        }
    }

    pub fn from_channel(channel: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.channel() == channel)
    }
}

impl std::fmt::Display for Addressing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// An addressed socket emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketEvent {
    pub v: u32,
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Connection to leave out of a `Send`, usually the one that caused it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_id: Option<String>,
}

impl SocketEvent {
    pub fn new(event: impl Into<String>, data: impl Into<Value>) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            event: event.into(),
            data: data.into(),
            user_id: None,
            role_id: None,
            room: None,
            socket_id: None,
        }
    }

    pub fn to_user(mut self, user_id: impl Into<RecordId>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn except(mut self, socket_id: impl Into<String>) -> Self {
        self.socket_id = Some(socket_id.into());
        self
    }

    pub fn in_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    pub fn for_role(mut self, role_id: i64) -> Self {
        self.role_id = Some(role_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_uses_camel_case_and_omits_absent_addressing() {
        let event = SocketEvent::new("notice", json!({"n": 1}))
            .to_user(5)
            .except("abc");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"v": 1, "event": "notice", "data": {"n": 1}, "userId": 5, "socketId": "abc"})
        );
    }

    #[test]
    fn user_ids_may_be_strings() {
        let event: SocketEvent =
            serde_json::from_value(json!({"v": 1, "event": "e", "userId": "42"})).unwrap();
        assert_eq!(event.user_id, Some(RecordId::Str("42".into())));
        assert_eq!(event.data, Value::Null);
    }

    #[test]
    fn channels_are_versioned_and_distinct() {
        for addressing in Addressing::ALL {
            assert!(addressing.channel().starts_with("nestor.socket.v1."));
            assert_eq!(Addressing::from_channel(addressing.channel()), Some(addressing));
        }
        assert_eq!(Addressing::from_channel("nestor.socket.v2.send"), None);
    }
}
