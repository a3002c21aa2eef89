// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./nestor.toml` > `~/.config/nestor/nestor.toml` > `/etc/nestor/nestor.toml`
//! with environment variable overrides via `NESTOR_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::NestorConfig;

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/nestor/nestor.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "nestor.toml";

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("nestor/nestor.toml"))
        .unwrap_or_default()
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/nestor/nestor.toml` (system-wide)
/// 3. `~/.config/nestor/nestor.toml` (user XDG config)
/// 4. `./nestor.toml` (local directory)
/// 5. `NESTOR_*` environment variables
pub fn load_config() -> Result<NestorConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<NestorConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(NestorConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<NestorConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(NestorConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(NestorConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` so keys that contain
/// underscores survive: `NESTOR_QUERY_PAGINATION_LIMIT` must map to
/// `query.pagination_limit`, not `query.pagination.limit`.
fn env_provider() -> Env {
    Env::prefixed("NESTOR_").map(|key| {
        let key_str = key.as_str().to_ascii_lowercase();
        let mapped = ["app", "query", "storage", "broker", "bus", "socket"]
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or(key_str);
        mapped.into()
    })
}
