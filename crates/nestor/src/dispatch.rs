// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `nestor dispatch` command implementation.

use std::sync::Arc;

use nestor_config::NestorConfig;
use nestor_core::{Job, JobResponse, NestorError, RecordStore};
use nestor_dispatch::{AUDIT_COLLECTION, JobDispatcher};
use nestor_query::SchemaRegistry;
use nestor_storage::{Database, DocumentRecordStore, SqliteQueueBroker};
use serde_json::Value;

/// Decodes a job from the command line. A job without `app` is stamped
/// with this application's id.
pub fn parse_job(app_id: &str, json: &str) -> Result<Job, NestorError> {
    let mut value: Value = serde_json::from_str(json)?;
    let Some(fields) = value.as_object_mut() else {
        return Err(NestorError::Config("job must be a JSON object".to_string()));
    };
    fields
        .entry("app")
        .or_insert_with(|| Value::String(app_id.to_string()));
    Ok(serde_json::from_value(value)?)
}

/// Dispatches one job onto the durable queue and returns the dispatch
/// response (the audit record, or the dispatch error).
pub async fn run_dispatch(
    config: &NestorConfig,
    queue: &str,
    job_json: &str,
) -> Result<JobResponse, NestorError> {
    let job = parse_job(&config.app.id, job_json)?;
    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;

    let audit: Arc<dyn RecordStore> = Arc::new(DocumentRecordStore::new(
        db.clone(),
        &SchemaRegistry::new(),
        AUDIT_COLLECTION,
        config.query,
    ));
    let broker = Arc::new(SqliteQueueBroker::new(db.clone(), config.broker.max_attempts));
    let response = JobDispatcher::new(broker, audit).dispatch(queue, job).await;

    db.close().await?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestor_core::Action;

    #[test]
    fn missing_app_is_stamped() {
        let job = parse_job("nestor", r#"{"action": "findAll"}"#).unwrap();
        assert_eq!(job.app, "nestor");
        assert_eq!(job.parsed_action(), Ok(Action::FindAll));

        let job = parse_job("nestor", r#"{"app": "api", "action": "create"}"#).unwrap();
        assert_eq!(job.app, "api");
    }

    #[test]
    fn non_objects_are_rejected() {
        assert!(matches!(
            parse_job("nestor", "[1]"),
            Err(NestorError::Config(_))
        ));
        assert!(matches!(
            parse_job("nestor", "{"),
            Err(NestorError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn dispatch_enqueues_and_audits() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NestorConfig::default();
        config.storage.database_path = dir.path().join("n.db").to_string_lossy().to_string();

        let response = run_dispatch(&config, "users", r#"{"action": "getCount"}"#)
            .await
            .unwrap();
        assert!(response.error.is_none(), "{:?}", response.error);
        let record = response.data.unwrap();
        assert_eq!(record["queue"], "users");
        assert_eq!(record["status"], "Pending");

        let db = Database::open(&config.storage.database_path).await.unwrap();
        let pending = nestor_storage::queue::depth(&db, "users", "pending")
            .await
            .unwrap();
        assert_eq!(pending, 1);
    }
}
