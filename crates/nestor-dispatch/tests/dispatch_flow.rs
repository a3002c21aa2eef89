// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch, audit trail and worker round trips.

use std::sync::Arc;
use std::time::Duration;

use nestor_core::{
    Action, Job, JobError, JobOption, JobStatus, MessageBroker, Record, RecordId, RecordStore,
    RecordTarget,
};
use nestor_dispatch::{JobDispatcher, Outcome};
use nestor_test_utils::{FailingBroker, TestHarness};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

fn body(value: Value) -> Record {
    value.as_object().cloned().expect("object")
}

async fn audit_record(audit: &Arc<dyn RecordStore>, uid: &str) -> Record {
    audit
        .find_one(&RecordTarget::Id(RecordId::from(uid)), &JobOption::default())
        .await
        .unwrap()
        .expect("audit record exists")
}

fn uid_of(data: &Value) -> String {
    data["_id"].as_str().expect("document key").to_string()
}

#[tokio::test]
async fn dispatch_leaves_a_pending_audit_record() {
    let h = TestHarness::builder().build().await.unwrap();
    let job = h
        .job()
        .with_action(Action::Create)
        .with_body(body(json!({"name": "Ada"})));

    let response = h.dispatcher.dispatch("jobs", job).await;
    assert!(response.error.is_none(), "{:?}", response.error);
    let data = response.data.expect("audit record");
    assert_eq!(data["status"], json!("Pending"));
    assert_eq!(data["queue"], json!("jobs"));

    let published = h.broker.published().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "jobs");
    let sent: Job = serde_json::from_str(&published[0].1).unwrap();
    assert_eq!(sent.uid.as_deref(), Some(uid_of(&data).as_str()));
    assert_eq!(sent.status, JobStatus::Pending);
}

#[tokio::test]
async fn completion_updates_only_its_own_record() {
    let h = TestHarness::builder().build().await.unwrap();
    let first = h
        .dispatcher
        .dispatch("jobs", h.job().with_action(Action::FindAll))
        .await
        .data
        .unwrap();
    let second = h
        .dispatcher
        .dispatch("jobs", h.job().with_action(Action::GetCount))
        .await
        .data
        .unwrap();

    let mut finished = h.job().with_action(Action::FindAll);
    finished.uid = Some(uid_of(&first));
    finished.done(nestor_core::JobResponse::count(0));
    h.dispatcher.report_completion(&finished).await;

    let first = audit_record(&h.audit, &uid_of(&first)).await;
    assert_eq!(first["status"], json!("Completed"));
    assert_eq!(first["response"]["count"], json!(0));
    let second = audit_record(&h.audit, &uid_of(&second)).await;
    assert_eq!(second["status"], json!("Pending"));
}

#[tokio::test]
async fn completion_without_uid_is_ignored() {
    let h = TestHarness::builder().build().await.unwrap();
    let mut job = h.job().with_action(Action::FindAll);
    job.done(nestor_core::JobResponse::count(1));
    h.dispatcher.report_completion(&job).await;

    job.uid = Some("0123456789abcdef01234567".into());
    h.dispatcher.report_completion(&job).await;
    assert_eq!(h.audit.count(&JobOption::default()).await.unwrap(), 0);
}

#[tokio::test]
async fn publish_failure_is_a_dispatch_error() {
    let h = TestHarness::builder().build().await.unwrap();
    let dispatcher = JobDispatcher::new(Arc::new(FailingBroker), h.audit.clone());

    let response = dispatcher
        .dispatch("jobs", h.job().with_action(Action::FindAll))
        .await;
    match response.error {
        Some(JobError::Dispatch(message)) => assert!(message.contains("jobs unavailable")),
        other => panic!("expected a dispatch error, got {other:?}"),
    }

    let page = h.audit.find_all(&JobOption::default()).await.unwrap();
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0]["status"], json!("Errored"));
}

#[tokio::test]
async fn worker_runs_dispatched_jobs_and_reports_back() {
    let h = TestHarness::builder().build().await.unwrap();
    let worker = h.worker();
    let created = h
        .dispatcher
        .dispatch(
            "jobs",
            h.job()
                .with_action(Action::Create)
                .with_body(body(json!({"name": "Grace", "email": "g@example.com"}))),
        )
        .await
        .data
        .unwrap();

    assert_eq!(worker.poll_once().await.unwrap(), 1);
    assert_eq!(worker.poll_once().await.unwrap(), 0);
    assert_eq!(h.broker.acked().await.len(), 1);

    let audit = audit_record(&h.audit, &uid_of(&created)).await;
    assert_eq!(audit["status"], json!("Completed"));
    assert_eq!(audit["response"]["data"]["name"], json!("Grace"));
    assert_eq!(audit["response"]["data"]["created_by"], json!(1));

    let users = h.users.store().count(&JobOption::default()).await.unwrap();
    assert_eq!(users, 1);
}

#[tokio::test]
async fn failed_jobs_are_recorded_as_errored() {
    let h = TestHarness::builder().build().await.unwrap();
    let worker = h.worker();
    let dispatched = h
        .dispatcher
        .dispatch("jobs", h.job().with_action(Action::FindById).with_id(404))
        .await
        .data
        .unwrap();

    assert_eq!(worker.poll_once().await.unwrap(), 1);
    let audit = audit_record(&h.audit, &uid_of(&dispatched)).await;
    assert_eq!(audit["status"], json!("Errored"));
    assert_eq!(audit["response"]["error"]["kind"], json!("NotFound"));
    // Errored jobs are still settled with the broker.
    assert_eq!(h.broker.acked().await.len(), 1);
}

#[tokio::test]
async fn foreign_and_unreadable_deliveries() {
    let h = TestHarness::builder().build().await.unwrap();
    let worker = h.worker();

    let foreign = serde_json::to_string(&Job::new("elsewhere").with_action(Action::FindAll)).unwrap();
    h.broker.publish("jobs", &foreign).await.unwrap();
    h.broker.publish("jobs", "not a job").await.unwrap();

    let consumer: &dyn nestor_core::MessageConsumer = h.broker.as_ref();
    let delivery = consumer.receive("jobs").await.unwrap().unwrap();
    assert_eq!(worker.process(&delivery).await.unwrap(), Outcome::Foreign);
    let delivery = consumer.receive("jobs").await.unwrap().unwrap();
    assert_eq!(worker.process(&delivery).await.unwrap(), Outcome::Unreadable);

    assert_eq!(h.broker.acked().await.len(), 1);
    let nacked = h.broker.nacked().await;
    assert_eq!(nacked.len(), 1);
    assert!(nacked[0].1.contains("unreadable job payload"));
}

#[tokio::test]
async fn unrouted_queues_are_failed_back() {
    let h = TestHarness::builder().build().await.unwrap();
    let worker = h.worker();
    let job = serde_json::to_string(&h.job().with_action(Action::FindAll)).unwrap();
    h.broker.publish("mail", &job).await.unwrap();

    let consumer: &dyn nestor_core::MessageConsumer = h.broker.as_ref();
    let delivery = consumer.receive("mail").await.unwrap().unwrap();
    assert_eq!(worker.process(&delivery).await.unwrap(), Outcome::Unrouted);
    assert_eq!(h.broker.nacked().await[0].1, "no handler routed for queue");
}

#[tokio::test]
async fn run_stops_on_cancellation() {
    let h = TestHarness::builder().build().await.unwrap();
    let worker = h.worker();
    let dispatched = h
        .dispatcher
        .dispatch("jobs", h.job().with_action(Action::GetCount))
        .await
        .data
        .unwrap();

    let cancel = CancellationToken::new();
    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move { worker.run(cancel).await }
    });

    let uid = uid_of(&dispatched);
    let mut status = Value::Null;
    for _ in 0..100 {
        status = audit_record(&h.audit, &uid).await["status"].clone();
        if status == json!("Completed") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, json!("Completed"));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("worker stops")
        .unwrap();
}
