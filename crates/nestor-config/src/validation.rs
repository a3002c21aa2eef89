// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde attributes cannot express. All
//! failures are collected; validation does not stop at the first one.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::{MAX_UNBOUNDED_LIMIT, NestorConfig};

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &NestorConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.app.id.trim().is_empty() {
        errors.push(ConfigError::validation("app.id must not be empty"));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.query.pagination_limit < 1 {
        errors.push(ConfigError::validation(
            "query.pagination_limit must be at least 1",
        ));
    }

    let cap = config.query.unbounded_limit_cap;
    if !(1..=MAX_UNBOUNDED_LIMIT).contains(&cap) {
        errors.push(ConfigError::validation(format!(
            "query.unbounded_limit_cap must be between 1 and {MAX_UNBOUNDED_LIMIT}, got {cap}"
        )));
    }

    let mut seen_queues = HashSet::new();
    for (i, queue) in config.broker.queues.iter().enumerate() {
        if queue.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "broker.queues[{i}] must not be empty"
            )));
        } else if !seen_queues.insert(queue) {
            errors.push(ConfigError::validation(format!(
                "duplicate queue name `{queue}` in broker.queues"
            )));
        }
    }

    if config.broker.poll_interval_ms == 0 {
        errors.push(ConfigError::validation(
            "broker.poll_interval_ms must be greater than 0",
        ));
    }

    if config.broker.max_attempts == 0 {
        errors.push(ConfigError::validation(
            "broker.max_attempts must be at least 1",
        ));
    }

    if config.bus.poll_interval_ms == 0 {
        errors.push(ConfigError::validation(
            "bus.poll_interval_ms must be greater than 0",
        ));
    }

    if config.bus.capacity == 0 {
        errors.push(ConfigError::validation("bus.capacity must be at least 1"));
    }

    let host = config.socket.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("socket.host must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "socket.host `{host}` is not a valid IP address or hostname"
        )));
    }

    let mut seen_tokens = HashSet::new();
    for (i, identity) in config.socket.tokens.iter().enumerate() {
        if identity.token.is_empty() {
            errors.push(ConfigError::validation(format!(
                "socket.tokens[{i}].token must not be empty"
            )));
        } else if !seen_tokens.insert(&identity.token) {
            errors.push(ConfigError::validation(format!(
                "socket.tokens[{i}] repeats a token already assigned to another identity"
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TokenIdentity;

    fn messages(config: &NestorConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&NestorConfig::default()).is_ok());
    }

    #[test]
    fn cap_above_hard_ceiling_fails() {
        let mut config = NestorConfig::default();
        config.query.unbounded_limit_cap = 5000;
        assert!(messages(&config)[0].contains("unbounded_limit_cap"));
    }

    #[test]
    fn collects_every_failure() {
        let mut config = NestorConfig::default();
        config.storage.database_path = " ".into();
        config.query.pagination_limit = 0;
        config.broker.queues = vec!["a".into(), "a".into(), "".into()];
        let all = messages(&config);
        assert_eq!(all.len(), 4, "{all:?}");
        assert!(all.iter().any(|m| m.contains("duplicate queue name `a`")));
    }

    #[test]
    fn duplicate_socket_tokens_fail() {
        let mut config = NestorConfig::default();
        let identity = TokenIdentity {
            token: "secret".into(),
            user_id: 1,
            role_id: None,
        };
        config.socket.tokens = vec![identity.clone(), TokenIdentity { user_id: 2, ..identity }];
        assert!(messages(&config)[0].contains("socket.tokens[1]"));
    }

    #[test]
    fn bad_host_fails() {
        let mut config = NestorConfig::default();
        config.socket.host = "not a host!".into();
        assert!(messages(&config)[0].contains("socket.host"));
    }
}
