// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Hard ceiling for `limit = -1` ("all").
pub const MAX_UNBOUNDED_LIMIT: u32 = 1000;

/// Top-level Nestor configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NestorConfig {
    /// Application identity and logging.
    #[serde(default)]
    pub app: AppConfig,

    /// Pagination defaults for the query translator.
    #[serde(default)]
    pub query: QueryConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Job queue settings.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Event bus settings.
    #[serde(default)]
    pub bus: BusConfig,

    /// Socket gateway settings.
    #[serde(default)]
    pub socket: SocketConfig,
}

/// Application identity configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Identifier stamped into new jobs and checked by workers.
    #[serde(default = "default_app_id")]
    pub id: String,

    /// Display name.
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            id: default_app_id(),
            name: default_app_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_app_id() -> String {
    "nestor".to_string()
}

fn default_app_name() -> String {
    "Nestor".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Pagination configuration handed to the query translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    /// Limit applied when a job does not specify one.
    #[serde(default = "default_pagination_limit")]
    pub pagination_limit: u32,

    /// Effective limit for `limit = -1`. Never above [`MAX_UNBOUNDED_LIMIT`].
    #[serde(default = "default_unbounded_limit_cap")]
    pub unbounded_limit_cap: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            pagination_limit: default_pagination_limit(),
            unbounded_limit_cap: default_unbounded_limit_cap(),
        }
    }
}

fn default_pagination_limit() -> u32 {
    10
}

fn default_unbounded_limit_cap() -> u32 {
    MAX_UNBOUNDED_LIMIT
}

/// Storage backend configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("nestor").join("nestor.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("nestor.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Job queue configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    /// Queues the worker consumes.
    #[serde(default = "default_queues")]
    pub queues: Vec<String>,

    /// Delay between polls of an empty queue.
    #[serde(default = "default_broker_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Deliveries before a message is left failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            queues: default_queues(),
            poll_interval_ms: default_broker_poll_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_queues() -> Vec<String> {
    vec!["jobs".to_string()]
}

fn default_broker_poll_interval_ms() -> u64 {
    250
}

fn default_max_attempts() -> u32 {
    3
}

/// Which transport carries socket events between instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusMode {
    /// In-process only; single-instance deployments.
    #[default]
    Local,
    /// Relayed through the shared SQLite database file.
    Shared,
}

/// Event bus configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    #[serde(default)]
    pub mode: BusMode,

    /// Relay poll interval for the shared bus.
    #[serde(default = "default_bus_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-channel buffer before slow subscribers start lagging.
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            mode: BusMode::default(),
            poll_interval_ms: default_bus_poll_interval_ms(),
            capacity: default_bus_capacity(),
        }
    }
}

fn default_bus_poll_interval_ms() -> u64 {
    100
}

fn default_bus_capacity() -> usize {
    1024
}

/// How "emit to role" events are delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleDelivery {
    /// Only authenticated connections whose identity has the addressed role.
    #[default]
    ByRole,
    /// Every authenticated connection, regardless of role.
    AllAuthenticated,
}

/// An identity accepted at socket handshake.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TokenIdentity {
    pub token: String,
    pub user_id: i64,
    #[serde(default)]
    pub role_id: Option<i64>,
}

/// Socket gateway configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SocketConfig {
    /// Whether `serve` starts the WebSocket gateway.
    #[serde(default = "default_socket_enabled")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub role_delivery: RoleDelivery,

    /// Tokens accepted at handshake.
    #[serde(default)]
    pub tokens: Vec<TokenIdentity>,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            enabled: default_socket_enabled(),
            host: default_host(),
            port: default_port(),
            role_delivery: RoleDelivery::default(),
            tokens: Vec::new(),
        }
    }
}

fn default_socket_enabled() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3200
}
