// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two instances sharing one database file see each other's publishes.

use std::time::Duration;

use nestor_bus::{SharedBus, build_bus};
use nestor_config::{BusConfig, BusMode};
use nestor_core::{PluginAdapter, PubSub};
use nestor_storage::Database;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

fn config() -> BusConfig {
    BusConfig {
        mode: BusMode::Shared,
        poll_interval_ms: 10,
        capacity: 16,
    }
}

#[tokio::test]
async fn publishes_cross_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bus.db");
    let path = path.to_str().unwrap();
    let cancel = CancellationToken::new();

    let first = SharedBus::start(Database::open(path).await.unwrap(), &config(), &cancel)
        .await
        .unwrap();
    let second = SharedBus::start(Database::open(path).await.unwrap(), &config(), &cancel)
        .await
        .unwrap();

    let mut on_first = first.subscribe("nestor.test").await.unwrap();
    let mut on_second = second.subscribe("nestor.test").await.unwrap();

    first.publish("nestor.test", "hello").await.unwrap();

    let got = timeout(Duration::from_secs(5), on_second.recv()).await.unwrap();
    assert_eq!(got.as_deref(), Some("hello"));
    let echo = timeout(Duration::from_secs(5), on_first.recv()).await.unwrap();
    assert_eq!(echo.as_deref(), Some("hello"));

    cancel.cancel();
}

#[tokio::test]
async fn history_before_start_is_not_replayed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bus.db");
    let path = path.to_str().unwrap();
    let cancel = CancellationToken::new();

    let early = SharedBus::start(Database::open(path).await.unwrap(), &config(), &cancel)
        .await
        .unwrap();
    early.publish("c", "old").await.unwrap();

    let late = SharedBus::start(Database::open(path).await.unwrap(), &config(), &cancel)
        .await
        .unwrap();
    let mut sub = late.subscribe("c").await.unwrap();
    early.publish("c", "new").await.unwrap();

    let got = timeout(Duration::from_secs(5), sub.recv()).await.unwrap();
    assert_eq!(got.as_deref(), Some("new"));
    cancel.cancel();
}

#[tokio::test]
async fn shutdown_marks_the_relay_unhealthy() {
    let db = Database::open_in_memory().await.unwrap();
    let bus = SharedBus::start(db, &config(), &CancellationToken::new())
        .await
        .unwrap();
    bus.shutdown().await.unwrap();
    assert!(matches!(
        bus.health_check().await.unwrap(),
        nestor_core::HealthStatus::Unhealthy(_)
    ));
}

#[tokio::test]
async fn local_mode_builds_an_in_process_bus() {
    let db = Database::open_in_memory().await.unwrap();
    let bus = build_bus(&BusConfig::default(), &db, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(bus.name(), "local-bus");
    let mut sub = bus.subscribe("c").await.unwrap();
    bus.publish("c", "x").await.unwrap();
    assert_eq!(sub.recv().await.as_deref(), Some("x"));
}
