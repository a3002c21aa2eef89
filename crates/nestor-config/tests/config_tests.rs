// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Nestor configuration system.

use std::path::Path;

use nestor_config::diagnostic::ConfigError;
use nestor_config::{
    BusMode, RoleDelivery, load_and_validate_path, load_and_validate_str, load_config_from_str,
};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[app]
id = "billing"
log_level = "debug"

[query]
pagination_limit = 25
unbounded_limit_cap = 500

[storage]
database_path = "/tmp/nestor-test.db"
wal_mode = false

[broker]
queues = ["queue.mail", "queue.report"]
poll_interval_ms = 50
max_attempts = 5

[bus]
mode = "shared"

[socket]
port = 4000
role_delivery = "all_authenticated"
tokens = [{ token = "abc", user_id = 7, role_id = 1 }]
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.app.id, "billing");
    assert_eq!(config.app.name, "Nestor");
    assert_eq!(config.query.pagination_limit, 25);
    assert_eq!(config.query.unbounded_limit_cap, 500);
    assert!(!config.storage.wal_mode);
    assert_eq!(config.broker.queues, vec!["queue.mail", "queue.report"]);
    assert_eq!(config.broker.max_attempts, 5);
    assert_eq!(config.bus.mode, BusMode::Shared);
    assert_eq!(config.bus.capacity, 1024);
    assert_eq!(config.socket.port, 4000);
    assert_eq!(config.socket.role_delivery, RoleDelivery::AllAuthenticated);
    assert_eq!(config.socket.tokens[0].user_id, 7);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_and_validate_str("").expect("defaults should validate");
    assert_eq!(config.query.pagination_limit, 10);
    assert_eq!(config.broker.poll_interval_ms, 250);
    assert!(config.socket.enabled);
}

#[test]
fn unknown_key_gets_suggestion() {
    let errors = load_and_validate_str("[query]\npagination_limt = 5\n").unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "pagination_limt");
            assert_eq!(suggestion.as_deref(), Some("pagination_limit"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn wrong_type_is_reported_with_key_path() {
    let errors = load_and_validate_str("[socket]\nport = \"high\"\n").unwrap_err();
    assert!(
        matches!(&errors[0], ConfigError::InvalidType { key, .. } if key.contains("port")),
        "got {errors:?}"
    );
}

#[test]
fn validation_errors_surface_from_str_loader() {
    let errors = load_and_validate_str("[query]\nunbounded_limit_cap = 2000\n").unwrap_err();
    assert!(matches!(&errors[0], ConfigError::Validation { message } if message.contains("1000")));
}

#[test]
fn env_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "custom.toml",
            "[query]\npagination_limit = 20\n\n[broker]\nmax_attempts = 2\n",
        )?;
        jail.set_env("NESTOR_QUERY_PAGINATION_LIMIT", "40");
        jail.set_env("NESTOR_SOCKET_ROLE_DELIVERY", "all_authenticated");

        let config = load_and_validate_path(Path::new("custom.toml")).expect("valid config");
        assert_eq!(config.query.pagination_limit, 40);
        assert_eq!(config.broker.max_attempts, 2);
        assert_eq!(config.socket.role_delivery, RoleDelivery::AllAuthenticated);
        Ok(())
    });
}

#[test]
fn uppercase_env_keys_land_in_their_section() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("custom.toml", "[app]\nid = \"file\"\n")?;
        jail.set_env("NESTOR_APP_ID", "billing");
        jail.set_env("NESTOR_BUS_MODE", "shared");

        let config = load_and_validate_path(Path::new("custom.toml")).expect("valid config");
        assert_eq!(config.app.id, "billing");
        assert_eq!(config.bus.mode, BusMode::Shared);
        Ok(())
    });
}

#[test]
fn file_errors_suggest_the_intended_key() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("bad.toml", "[bus]\nmdoe = \"shared\"\n")?;
        let errors = load_and_validate_path(Path::new("bad.toml")).unwrap_err();
        match &errors[0] {
            ConfigError::UnknownKey {
                key, suggestion, ..
            } => {
                assert_eq!(key, "mdoe");
                assert_eq!(suggestion.as_deref(), Some("mode"));
            }
            other => panic!("expected UnknownKey, got {other:?}"),
        }
        Ok(())
    });
}
