// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job dispatch with a durable audit trail.
//!
//! Every dispatched job leaves one audit record: the job snapshot taken at
//! dispatch time plus the queue name. The record's key becomes the job's
//! correlation id (`uid`), which the worker later uses to write back the
//! terminal status and response.

use std::sync::Arc;

use nestor_core::{
    Job, JobError, JobOption, JobResponse, JobStatus, MessageBroker, Record, RecordId,
    RecordStore, RecordTarget,
};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::metrics;

/// Collection holding audit records.
pub const AUDIT_COLLECTION: &str = "job_logs";

/// Hands jobs to the broker and keeps their audit records.
#[derive(Clone)]
pub struct JobDispatcher {
    broker: Arc<dyn MessageBroker>,
    audit: Arc<dyn RecordStore>,
}

impl JobDispatcher {
    pub fn new(broker: Arc<dyn MessageBroker>, audit: Arc<dyn RecordStore>) -> Self {
        Self { broker, audit }
    }

    /// The audit store, for querying the trail.
    pub fn audit(&self) -> &Arc<dyn RecordStore> {
        &self.audit
    }

    /// Persists an audit record for `job`, stamps its key as the job's
    /// `uid`, and publishes the job on `queue`.
    ///
    /// Returns `{ data: auditRecord }`. Any failure comes back as a
    /// `Dispatch` error response; nothing is thrown.
    pub async fn dispatch(&self, queue: &str, job: Job) -> JobResponse {
        self.try_dispatch(queue, job).await.into()
    }

    async fn try_dispatch(&self, queue: &str, mut job: Job) -> Result<JobResponse, JobError> {
        let record = self
            .audit
            .insert(snapshot(queue, &job)?, &JobOption::default())
            .await
            .map_err(|e| JobError::Dispatch(format!("audit record not persisted: {e}")))?;
        let uid = audit_key(&record)
            .ok_or_else(|| JobError::Dispatch("audit record has no key".to_string()))?;
        job.uid = Some(uid.to_string());

        let payload = serde_json::to_string(&job)
            .map_err(|e| JobError::Dispatch(format!("job not serializable: {e}")))?;
        if let Err(err) = self.broker.publish(queue, &payload).await {
            warn!(queue, uid = %uid, error = %err, "publish failed, audit record marked errored");
            let failed = JobError::Dispatch(err.to_string());
            self.record_outcome(&uid, JobStatus::Errored, &JobResponse::error(failed.clone()))
                .await;
            return Err(failed);
        }

        metrics::record_dispatched(queue);
        info!(queue, uid = %uid, action = job.action.as_deref().unwrap_or_default(), "job dispatched");
        Ok(JobResponse::data(record))
    }

    /// Writes the job's terminal status and response into its audit record.
    ///
    /// Best-effort: a job without a `uid`, an unknown `uid` or a failed write
    /// is dropped without a trace.
    pub async fn report_completion(&self, job: &Job) {
        let Some(uid) = job.uid.as_deref().filter(|uid| !uid.is_empty()) else {
            return;
        };
        self.record_outcome(&RecordId::from(uid), job.status, &job.response)
            .await;
    }

    async fn record_outcome(&self, uid: &RecordId, status: JobStatus, response: &JobResponse) {
        let Ok(response) = serde_json::to_value(response) else {
            return;
        };
        let mut changes = Record::new();
        changes.insert("status".into(), json!(status));
        changes.insert("response".into(), response);
        let _ = self
            .audit
            .update(
                &RecordTarget::Id(uid.clone()),
                changes,
                &JobOption::default(),
            )
            .await;
    }
}

/// The audit snapshot: the job as JSON with the queue name, always pending.
fn snapshot(queue: &str, job: &Job) -> Result<Record, JobError> {
    let value = serde_json::to_value(job)
        .map_err(|e| JobError::Dispatch(format!("job not serializable: {e}")))?;
    let Value::Object(mut record) = value else {
        return Err(JobError::Dispatch("job did not serialize to an object".into()));
    };
    record.remove("uid");
    record.insert("status".into(), json!(JobStatus::Pending));
    record.insert("queue".into(), Value::String(queue.to_string()));
    debug!(queue, fields = record.len(), "audit snapshot taken");
    Ok(record)
}

/// Key of a freshly persisted record: `_id` for documents, `id` for rows.
fn audit_key(record: &Record) -> Option<RecordId> {
    match record.get("_id").or_else(|| record.get("id"))? {
        Value::String(s) => Some(RecordId::Str(s.clone())),
        Value::Number(n) => n.as_i64().map(RecordId::Int),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestor_core::{Action, Owner};

    #[test]
    fn snapshot_is_pending_and_tagged() {
        let mut job = Job::new("api")
            .with_action(Action::Create)
            .with_owner(Owner::user(2, None));
        job.uid = Some("stale".into());
        job.done(JobResponse::data(1));

        let record = snapshot("queue.mail", &job).unwrap();
        assert_eq!(record["status"], json!("Pending"));
        assert_eq!(record["queue"], json!("queue.mail"));
        assert_eq!(record["action"], json!("create"));
        assert!(!record.contains_key("uid"));
    }

    #[test]
    fn audit_key_prefers_document_keys() {
        let doc = json!({"_id": "65f0c0ffee", "id": 3});
        assert_eq!(
            audit_key(doc.as_object().unwrap()),
            Some(RecordId::Str("65f0c0ffee".into()))
        );
        let row = json!({"id": 3});
        assert_eq!(audit_key(row.as_object().unwrap()), Some(RecordId::Int(3)));
        assert_eq!(audit_key(&Record::new()), None);
    }
}
