// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the job stack over a temp SQLite file: a `users`
//! model service on the relational engine, the `job_logs` audit collection
//! on the document engine, a recording broker, a dispatcher and a local bus.

use std::sync::Arc;

use nestor_bus::LocalBus;
use nestor_config::{NestorConfig, StorageConfig};
use nestor_core::{Job, NestorError, Owner, RecordStore};
use nestor_dispatch::{AUDIT_COLLECTION, JobDispatcher, JobWorker};
use nestor_model::{FieldRules, ModelService};
use nestor_query::{EntitySchema, SchemaRegistry};
use nestor_storage::{Database, DocumentRecordStore, SqlRecordStore};

use crate::brokers::RecordingBroker;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    app_id: String,
    unique_email: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            app_id: "nestor".to_string(),
            unique_email: false,
        }
    }

    /// Application id stamped into jobs and expected by the worker.
    pub fn with_app_id(mut self, app_id: &str) -> Self {
        self.app_id = app_id.to_string();
        self
    }

    /// Reject `users` creates whose email is taken.
    pub fn with_unique_email(mut self) -> Self {
        self.unique_email = true;
        self
    }

    /// Build the harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, NestorError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| NestorError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();

        let mut config = NestorConfig::default();
        config.app.id = self.app_id;
        config.storage = StorageConfig {
            database_path: db_path.clone(),
            wal_mode: true,
        };
        config.broker.poll_interval_ms = 10;

        let db = Database::open(&db_path).await?;
        let registry = Arc::new(
            SchemaRegistry::new().with(EntitySchema::new("users").searchable(&["name", "email"])),
        );

        let users_store: Arc<dyn RecordStore> = Arc::new(
            SqlRecordStore::open(db.clone(), registry.clone(), "users", config.query).await?,
        );
        let mut users = ModelService::new(users_store);
        if self.unique_email {
            users = users.with_hooks(Arc::new(
                FieldRules::new().unique("email", "email already registered"),
            ));
        }

        let audit: Arc<dyn RecordStore> = Arc::new(DocumentRecordStore::new(
            db.clone(),
            &registry,
            AUDIT_COLLECTION,
            config.query,
        ));
        let broker = Arc::new(RecordingBroker::new());
        let dispatcher = JobDispatcher::new(broker.clone(), audit.clone());

        Ok(TestHarness {
            db,
            users,
            audit,
            broker,
            dispatcher,
            bus: LocalBus::new(config.bus.capacity),
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with in-memory brokers and temp storage.
pub struct TestHarness {
    /// Shared database handle (temp file, removed on drop).
    pub db: Database,
    /// Model service for the `users` entity.
    pub users: ModelService,
    /// The `job_logs` audit store.
    pub audit: Arc<dyn RecordStore>,
    pub broker: Arc<RecordingBroker>,
    pub dispatcher: JobDispatcher,
    pub bus: LocalBus,
    pub config: NestorConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A job for this harness's app, owned by user 1 with role 1.
    pub fn job(&self) -> Job {
        Job::new(&self.config.app.id).with_owner(Owner::user(1, Some(1)))
    }

    /// A worker consuming the recording broker with `users` routed on every
    /// configured queue.
    pub fn worker(&self) -> JobWorker {
        let mut worker = JobWorker::new(
            self.broker.clone(),
            self.dispatcher.clone(),
            &self.config.broker,
            &self.config.app.id,
        );
        for queue in &self.config.broker.queues {
            worker = worker.route(queue, Arc::new(self.users.clone()));
        }
        worker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestor_core::Action;

    #[tokio::test]
    async fn harness_builds_with_defaults() {
        let harness = TestHarness::builder().build().await.unwrap();
        assert_eq!(harness.config.app.id, "nestor");
        assert_eq!(harness.users.entity(), "users");
        assert_eq!(harness.worker().routed_queues(), vec!["jobs"]);
    }

    #[tokio::test]
    async fn jobs_carry_the_harness_app() {
        let harness = TestHarness::builder().with_app_id("api").build().await.unwrap();
        let job = harness.job().with_action(Action::FindAll);
        assert_eq!(job.app, "api");
    }
}
