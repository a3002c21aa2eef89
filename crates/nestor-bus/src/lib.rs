// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pub/sub transports for Nestor.
//!
//! [`LocalBus`] serves a single process. [`SharedBus`] relays every publish
//! through the shared SQLite file so all instances using it see it.

pub mod local;
pub mod shared;

use std::sync::Arc;

use nestor_config::{BusConfig, BusMode};
use nestor_core::{NestorError, PubSub};
use nestor_storage::Database;
use tokio_util::sync::CancellationToken;

pub use local::LocalBus;
pub use shared::SharedBus;

/// Builds the transport selected by `config.mode`.
pub async fn build_bus(
    config: &BusConfig,
    db: &Database,
    cancel: &CancellationToken,
) -> Result<Arc<dyn PubSub>, NestorError> {
    Ok(match config.mode {
        BusMode::Local => Arc::new(LocalBus::new(config.capacity)),
        BusMode::Shared => Arc::new(SharedBus::start(db.clone(), config, cancel).await?),
    })
}
