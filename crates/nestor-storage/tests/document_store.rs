// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document store behaviour: Mongo-dialect filters, soft delete, keys.

use nestor_config::QueryConfig;
use nestor_core::{JobOption, Record, RecordId, RecordStore, RecordTarget, StorageEngine};
use nestor_query::{EntitySchema, SchemaRegistry};
use nestor_storage::{Database, DocumentRecordStore};
use serde_json::{Value, json};

fn record(value: Value) -> Record {
    value.as_object().cloned().expect("object")
}

fn options(value: Value) -> JobOption {
    serde_json::from_value(value).expect("valid options")
}

fn queues(rows: &[Record]) -> Vec<&str> {
    rows.iter()
        .filter_map(|r| r.get("queue").and_then(Value::as_str))
        .collect()
}

async fn store() -> DocumentRecordStore {
    let db = Database::open_in_memory().await.unwrap();
    let registry = SchemaRegistry::new()
        .with(EntitySchema::new("job_logs").searchable(&["queue", "action"]));
    let store = DocumentRecordStore::new(db, &registry, "job_logs", QueryConfig::default());
    store
        .insert_many(
            vec![
                record(json!({"queue": "mail", "action": "create", "attempt": 1})),
                record(json!({"queue": "billing", "action": "update", "attempt": 3})),
                record(json!({"queue": "mailer", "action": "delete", "attempt": 2})),
            ],
            &JobOption::default(),
        )
        .await
        .unwrap();
    store
}

fn id_of(row: &Record) -> RecordId {
    RecordId::Str(row["_id"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn inserts_get_hex_keys_and_envelope() {
    let store = store().await;
    assert_eq!(store.engine(), StorageEngine::Document);
    let doc = store
        .insert(record(json!({"queue": "x"})), &JobOption::default())
        .await
        .unwrap();
    assert_eq!(doc["_id"].as_str().unwrap().len(), 24);
    assert_eq!(doc["active"], json!(true));
    assert!(doc["created_at"].is_string());
    assert!(!doc.contains_key("deleted_at"));
}

#[tokio::test]
async fn dsl_operators_filter_documents() {
    let store = store().await;
    let page = store
        .find_all(&options(json!({
            "where": {"queue": {"$like": "mail%"}, "attempt": {"$notIn": [2]}}
        })))
        .await
        .unwrap();
    assert_eq!(queues(&page.rows), vec!["mail"]);

    let page = store
        .find_all(&options(json!({"search": "BILL"})))
        .await
        .unwrap();
    assert_eq!(queues(&page.rows), vec!["billing"]);
}

#[tokio::test]
async fn sort_paginate_and_project() {
    let store = store().await;
    let page = store
        .find_all(&options(json!({
            "sort": [["attempt", "DESC"]],
            "offset": 1,
            "limit": 1,
            "select": ["queue"]
        })))
        .await
        .unwrap();
    assert_eq!(page.count, 3);
    assert_eq!(page.rows.len(), 1);
    let row = &page.rows[0];
    assert_eq!(row["queue"], json!("mailer"));
    assert!(row.contains_key("_id"));
    assert!(!row.contains_key("action"));
}

#[tokio::test]
async fn soft_delete_then_restore() {
    let store = store().await;
    let first = store
        .find_one(&RecordTarget::First, &options(json!({"where": {"queue": "mail"}})))
        .await
        .unwrap()
        .unwrap();
    let id = id_of(&first);

    store
        .delete(&RecordTarget::Id(id.clone()), Some(4), &JobOption::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(store.count(&JobOption::default()).await.unwrap(), 2);
    assert_eq!(
        store.count(&options(json!({"withDeleted": true}))).await.unwrap(),
        3
    );

    let restored = store.restore(&id, Some(5)).await.unwrap().unwrap();
    assert_eq!(restored["updated_by"], json!(5));
    assert_eq!(store.count(&JobOption::default()).await.unwrap(), 3);
}

#[tokio::test]
async fn update_by_key_keeps_previous_snapshot() {
    let store = store().await;
    let page = store.find_all(&JobOption::default()).await.unwrap();
    let id = id_of(&page.rows[1]);

    let updated = store
        .update(
            &RecordTarget::Id(id.clone()),
            record(json!({"attempt": 4, "_id": "ignored"})),
            &JobOption::default(),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.previous["attempt"], json!(3));
    assert_eq!(updated.current["attempt"], json!(4));
    assert_eq!(id_of(&updated.current), id);
}

#[tokio::test]
async fn bulk_operations() {
    let store = store().await;
    let changed = store
        .update_many(
            record(json!({"status": "Completed"})),
            &options(json!({"where": {"queue": {"$iLike": "MAIL%"}}})),
        )
        .await
        .unwrap();
    assert_eq!(changed, 2);

    let removed = store
        .delete_many(None, &options(json!({"where": {"status": "Completed"}, "hardDelete": true})))
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(
        store.count(&options(json!({"withDeleted": true}))).await.unwrap(),
        1
    );

    let truncated = store
        .delete_many(None, &options(json!({"truncate": true})))
        .await
        .unwrap();
    assert_eq!(truncated, 1);
}

#[tokio::test]
async fn upserts() {
    let store = store().await;
    let (found, created) = store
        .find_or_create(Record::new(), &options(json!({"where": {"queue": "billing"}})))
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(found["action"], json!("update"));

    let (made, created) = store
        .create_or_update(
            record(json!({"action": "noop"})),
            &options(json!({"where": {"queue": "audit"}})),
        )
        .await
        .unwrap();
    assert!(created);
    assert_eq!(made["queue"], json!("audit"));
}

#[tokio::test]
async fn grouping_is_rejected() {
    let store = store().await;
    let err = store
        .find_all(&options(json!({"group": ["queue"]})))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("group"));
}
