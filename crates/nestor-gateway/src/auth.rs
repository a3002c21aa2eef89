// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handshake authentication for the socket gateway.
//!
//! Tokens are checked in order:
//! 1. `token` query parameter (`/ws?token=...`)
//! 2. Bearer header (`Authorization: Bearer <token>`)
//!
//! No token at all admits a guest. A token that matches no configured
//! identity is refused.

use std::collections::HashMap;

use axum::http::HeaderMap;
use nestor_config::TokenIdentity;
use nestor_socket::Identity;

/// Outcome of a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    Guest,
    Authenticated(Identity),
    Refused,
}

/// Maps configured tokens to identities.
#[derive(Clone, Default)]
pub struct TokenAuthenticator {
    tokens: HashMap<String, Identity>,
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("tokens", &format_args!("[{} redacted]", self.tokens.len()))
            .finish()
    }
}

impl TokenAuthenticator {
    pub fn new(tokens: &[TokenIdentity]) -> Self {
        Self {
            tokens: tokens
                .iter()
                .map(|t| {
                    (
                        t.token.clone(),
                        Identity {
                            user_id: t.user_id,
                            role_id: t.role_id,
                        },
                    )
                })
                .collect(),
        }
    }

    /// Classifies a handshake from its query token and headers.
    pub fn authenticate(&self, query_token: Option<&str>, headers: &HeaderMap) -> Handshake {
        let token = query_token
            .filter(|t| !t.is_empty())
            .or_else(|| bearer_token(headers));
        match token {
            None => Handshake::Guest,
            Some(token) => match self.tokens.get(token) {
                Some(identity) => Handshake::Authenticated(*identity),
                None => Handshake::Refused,
            },
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
}
