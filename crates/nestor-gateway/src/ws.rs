// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handler.
//!
//! Client -> Server (JSON):
//! ```json
//! {"type": "join", "room": "R"}
//! {"type": "leave", "room": "R"}
//! {"type": "events"}
//! ```
//!
//! Server -> Client (JSON):
//! ```json
//! {"event": "events", "data": "socket working"}
//! {"event": "<name>", "data": ...}
//! ```

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use nestor_socket::{Connection, Identity};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::auth::Handshake;
use crate::server::GatewayState;

/// Frames queued per connection before new ones are dropped.
const OUTBOUND_CAPACITY: usize = 64;

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    token: Option<String>,
}

/// Frame from a client.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Join { room: String },
    Leave { room: String },
    Events,
}

/// Authenticates the handshake, then upgrades. Bad tokens get 401.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    State(state): State<GatewayState>,
) -> Response {
    let identity = match state.auth.authenticate(params.token.as_deref(), &headers) {
        Handshake::Guest => None,
        Handshake::Authenticated(identity) => Some(identity),
        Handshake::Refused => {
            tracing::debug!("socket handshake refused: unknown token");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Runs one connection: a writer task drains the outbound queue while this
/// task reads client frames. Bookkeeping is undone when the client leaves.
async fn handle_socket(socket: WebSocket, state: GatewayState, identity: Option<Identity>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
    let conn = Connection::new(identity, tx);
    register(&state, &conn);

    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(frame) => handle_frame(&state, &conn, frame),
                Err(e) => tracing::warn!(socket_id = %conn.id(), "invalid socket frame: {e}"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    unregister(&state, &conn);
    sender_task.abort();
}

fn register(state: &GatewayState, conn: &Connection) {
    state.hub.connect(conn.clone());
    if let Some(identity) = conn.identity() {
        state.registry.add(&identity.key(), conn.clone());
        if let Some(room) = identity.role_room() {
            state.hub.join(conn.id(), &room);
        }
        tracing::debug!(socket_id = %conn.id(), user_id = identity.user_id, "socket connected");
    } else {
        tracing::debug!(socket_id = %conn.id(), "guest socket connected");
    }
}

fn unregister(state: &GatewayState, conn: &Connection) {
    if let Some(identity) = conn.identity() {
        state.registry.remove(&identity.key(), conn.id());
    }
    state.hub.disconnect(conn.id());
    tracing::debug!(socket_id = %conn.id(), "socket disconnected");
}

fn handle_frame(state: &GatewayState, conn: &Connection, frame: ClientFrame) {
    match frame {
        ClientFrame::Join { room } => {
            state.hub.join(conn.id(), &room);
        }
        ClientFrame::Leave { room } => state.hub.leave(conn.id(), &room),
        ClientFrame::Events => {
            conn.emit("events", &Value::from("socket working"));
        }
    }
}
