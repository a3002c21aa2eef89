// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests: the binary's commands and the full job pipeline.
//!
//! Each test uses its own temp directory and database. Tests are
//! independent and order-insensitive.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;

use nestor_config::RoleDelivery;
use nestor_core::{Action, JobOption, Record, RecordId, RecordTarget};
use nestor_socket::{
    Connection, ConnectionHub, EventPropagator, Identity, SocketEvent, SocketRegistry,
};
use nestor_test_utils::TestHarness;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let db = dir.join("e2e.db");
    let path = dir.join("nestor.toml");
    std::fs::write(
        &path,
        format!(
            "[storage]\ndatabase_path = \"{}\"\n\n[broker]\nqueues = [\"users\"]\n{extra}",
            db.display()
        ),
    )
    .unwrap();
    path
}

fn nestor(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nestor"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

// ---- Binary commands ----

#[test]
fn config_command_prints_effective_toml() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let out = nestor(&config, &["config"]);
    assert!(out.status.success());
    let printed: toml::Value = toml::from_str(&String::from_utf8_lossy(&out.stdout)).unwrap();
    assert_eq!(printed["broker"]["queues"][0].as_str(), Some("users"));
    assert_eq!(printed["app"]["id"].as_str(), Some("nestor"));
    assert_eq!(printed["socket"]["port"].as_integer(), Some(3200));
}

#[test]
fn env_overrides_reach_the_binary() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let out = Command::new(env!("CARGO_BIN_EXE_nestor"))
        .arg("--config")
        .arg(&config)
        .arg("config")
        .env("NESTOR_APP_ID", "billing")
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("id = \"billing\""));
}

#[test]
fn invalid_config_fails_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "\n[query]\npagination_limit = 0\n");

    let out = nestor(&config, &["config"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("pagination_limit"));
}

#[test]
fn dispatch_command_prints_the_audit_record() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let out = nestor(&config, &["dispatch", "users", r#"{"action": "getCount"}"#]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let printed: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(printed["data"]["queue"], "users");
    assert_eq!(printed["data"]["status"], "Pending");
    assert_eq!(printed["data"]["app"], "nestor");
}

#[test]
fn dispatch_command_rejects_malformed_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");

    let out = nestor(&config, &["dispatch", "users", "not json"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("serialization error"));
}

// ---- Full pipeline ----

fn body(value: Value) -> Record {
    value.as_object().cloned().expect("object")
}

#[tokio::test]
async fn dispatched_create_runs_and_notifies_its_owner() {
    let harness = TestHarness::builder().build().await.unwrap();
    let worker = harness.worker();

    let propagator = EventPropagator::new(
        Arc::new(harness.bus.clone()),
        Arc::new(SocketRegistry::new()),
        Arc::new(ConnectionHub::new()),
        RoleDelivery::ByRole,
    );
    let cancel = CancellationToken::new();
    propagator.start(&cancel).await.unwrap();

    let owner = Identity {
        user_id: 1,
        role_id: Some(1),
    };
    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    let socket = Connection::new(Some(owner), tx);
    propagator.hub().connect(socket.clone());
    propagator.registry().add(&owner.key(), socket);

    let audit = harness
        .dispatcher
        .dispatch(
            "jobs",
            harness
                .job()
                .with_action(Action::Create)
                .with_body(body(json!({"name": "Ada", "email": "ada@example.com"}))),
        )
        .await
        .data
        .unwrap();
    assert_eq!(worker.poll_once().await.unwrap(), 1);

    let uid = audit["_id"].as_str().unwrap();
    let finished = harness
        .audit
        .find_one(&RecordTarget::Id(RecordId::from(uid)), &JobOption::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(finished["status"], "Completed");

    let created = finished["response"]["data"].clone();
    assert!(
        propagator
            .propagate_event(SocketEvent::new("users.created", created.clone()).to_user(1))
            .await
            .unwrap()
    );
    let frame = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let frame: Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(frame, json!({"event": "users.created", "data": created}));
    cancel.cancel();
}

#[tokio::test]
async fn duplicate_email_is_rejected_through_the_queue() {
    let harness = TestHarness::builder()
        .with_unique_email()
        .build()
        .await
        .unwrap();
    let worker = harness.worker();

    for _ in 0..2 {
        harness
            .dispatcher
            .dispatch(
                "jobs",
                harness
                    .job()
                    .with_action(Action::Create)
                    .with_body(body(json!({"email": "dup@example.com"}))),
            )
            .await;
    }
    assert_eq!(worker.poll_once().await.unwrap(), 1);
    assert_eq!(worker.poll_once().await.unwrap(), 1);

    let page = harness
        .audit
        .find_all(&JobOption::default())
        .await
        .unwrap();
    let mut statuses: Vec<String> = page
        .rows
        .iter()
        .map(|r| r["status"].as_str().unwrap_or_default().to_string())
        .collect();
    statuses.sort();
    assert_eq!(statuses, vec!["Completed", "Errored"]);
    assert_eq!(
        harness
            .users
            .store()
            .count(&JobOption::default())
            .await
            .unwrap(),
        1
    );
}
