// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generic CRUD orchestrator.
//!
//! [`ModelService`] composes a storage engine ([`RecordStore`]) with the
//! entity's [`ModelHooks`]. Every public operation consumes a job and
//! returns it with its response recorded and its status terminal; errors
//! never escape as `Err`.

use std::sync::Arc;

use nestor_core::{
    Action, Job, JobError, JobOption, JobResponse, Record, RecordStore, RecordTarget,
};
use serde_json::Value;
use tracing::debug;

use crate::hooks::{self, HookContext, ModelHooks, NoHooks};

/// CRUD surface for one entity.
#[derive(Clone)]
pub struct ModelService {
    store: Arc<dyn RecordStore>,
    hooks: Arc<dyn ModelHooks>,
}

impl ModelService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            hooks: Arc::new(NoHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ModelHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Entity the underlying store serves.
    pub fn entity(&self) -> &str {
        self.store.entity()
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Runs the operation named by `job.action`. Unknown names complete the
    /// job with `UnknownAction` without touching the store.
    pub async fn execute(&self, mut job: Job) -> Job {
        match job.parsed_action() {
            Ok(action) => self.perform(action, job).await,
            Err(err) => {
                job.done(JobResponse::error(err));
                job
            }
        }
    }

    /// Runs `action` through `before_* -> operation -> after_*`.
    ///
    /// The returned job is the one the operation saw, which a `before_*`
    /// hook may have rewritten. A job that is already terminal is returned
    /// unchanged.
    pub async fn perform(&self, action: Action, mut job: Job) -> Job {
        if job.status.is_terminal() {
            return job;
        }
        let ctx = HookContext {
            action,
            store: self.store.as_ref(),
        };
        let mut staged = match hooks::before(self.hooks.as_ref(), ctx, &job).await {
            Ok(staged) => staged,
            Err(err) => {
                debug!(entity = self.entity(), %action, kind = err.kind(), "rejected before operation");
                job.done(JobResponse::error(err));
                return job;
            }
        };

        let response = match self.native(action, &staged).await {
            Ok(response) => hooks::after(self.hooks.as_ref(), ctx, &staged, response)
                .await
                .into(),
            Err(err) => JobResponse::error(err),
        };
        if let Some(err) = &response.error {
            debug!(entity = self.entity(), %action, kind = err.kind(), "operation failed");
        }
        staged.done(response);
        staged
    }

    pub async fn find_all(&self, job: Job) -> Job {
        self.perform(Action::FindAll, job).await
    }

    pub async fn get_count(&self, job: Job) -> Job {
        self.perform(Action::GetCount, job).await
    }

    pub async fn find_by_id(&self, job: Job) -> Job {
        self.perform(Action::FindById, job).await
    }

    pub async fn find_one(&self, job: Job) -> Job {
        self.perform(Action::FindOne, job).await
    }

    pub async fn create(&self, job: Job) -> Job {
        self.perform(Action::Create, job).await
    }

    pub async fn update(&self, job: Job) -> Job {
        self.perform(Action::Update, job).await
    }

    pub async fn delete(&self, job: Job) -> Job {
        self.perform(Action::Delete, job).await
    }

    pub async fn find_or_create(&self, job: Job) -> Job {
        self.perform(Action::FindOrCreate, job).await
    }

    pub async fn create_or_update(&self, job: Job) -> Job {
        self.perform(Action::CreateOrUpdate, job).await
    }

    pub async fn create_bulk_records(&self, job: Job) -> Job {
        self.perform(Action::CreateBulkRecords, job).await
    }

    pub async fn update_bulk_records(&self, job: Job) -> Job {
        self.perform(Action::UpdateBulkRecords, job).await
    }

    pub async fn delete_bulk_records(&self, job: Job) -> Job {
        self.perform(Action::DeleteBulkRecords, job).await
    }

    pub async fn restore(&self, job: Job) -> Job {
        self.perform(Action::Restore, job).await
    }

    pub async fn find_and_update(&self, job: Job) -> Job {
        self.perform(Action::FindAndUpdate, job).await
    }

    pub async fn find_and_delete(&self, job: Job) -> Job {
        self.perform(Action::FindAndDelete, job).await
    }

    async fn native(&self, action: Action, job: &Job) -> Result<JobResponse, JobError> {
        let store = self.store.as_ref();
        let options = &job.options;
        let stamp = job.owner.stamp();

        match action {
            Action::FindAll => {
                let page = store.find_all(options).await?;
                Ok(JobResponse {
                    data: Some(rows(page.rows)),
                    offset: Some(page.offset),
                    limit: Some(page.limit),
                    count: Some(page.count),
                    ..JobResponse::default()
                })
            }
            Action::GetCount => Ok(JobResponse::count(store.count(options).await?)),
            Action::FindById => {
                let id = required_id(job, "findById")?;
                let found = store.find_one(&RecordTarget::Id(id), options).await?;
                found_or_empty(found, options)
            }
            Action::FindOne => {
                require_filter(options, "findOne")?;
                let found = store.find_one(&RecordTarget::First, options).await?;
                found_or_empty(found, options)
            }
            Action::Create => {
                let body = writable_body(job, "create")?;
                let data = store.insert(created(body, stamp), options).await?;
                Ok(JobResponse::data(data))
            }
            Action::Update => {
                let id = required_id(job, "update")?;
                let body = writable_body(job, "update")?;
                self.update_target(RecordTarget::Id(id), body, stamp, options)
                    .await
            }
            Action::FindAndUpdate => {
                require_filter(options, "findAndUpdate")?;
                let body = writable_body(job, "findAndUpdate")?;
                self.update_target(RecordTarget::First, body, stamp, options)
                    .await
            }
            Action::Delete => {
                let id = required_id(job, "delete")?;
                let removed = store.delete(&RecordTarget::Id(id), stamp, options).await?;
                removed
                    .map(JobResponse::data)
                    .ok_or_else(JobError::record_not_found)
            }
            Action::FindAndDelete => {
                require_filter(options, "findAndDelete")?;
                let removed = store.delete(&RecordTarget::First, stamp, options).await?;
                removed
                    .map(JobResponse::data)
                    .ok_or_else(JobError::record_not_found)
            }
            Action::Restore => {
                let id = required_id(job, "restore")?;
                store
                    .restore(&id, stamp)
                    .await?
                    .map(JobResponse::data)
                    .ok_or_else(JobError::record_not_found)
            }
            Action::FindOrCreate => {
                let body = writable_body(job, "findOrCreate")?;
                require_filter(options, "findOrCreate")?;
                let (data, was_created) =
                    store.find_or_create(created(body, stamp), options).await?;
                Ok(JobResponse {
                    created: Some(was_created),
                    ..JobResponse::data(data)
                })
            }
            Action::CreateOrUpdate => {
                let body = writable_body(job, "createOrUpdate")?;
                require_filter(options, "createOrUpdate")?;
                let (data, was_created) =
                    store.create_or_update(created(body, stamp), options).await?;
                Ok(JobResponse {
                    created: Some(was_created),
                    ..JobResponse::data(data)
                })
            }
            Action::CreateBulkRecords => {
                if job.records.is_empty() {
                    return Err(JobError::missing("createBulkRecords", "records"));
                }
                let records = job
                    .records
                    .iter()
                    .map(|record| created(restrict(record.clone(), options), stamp))
                    .collect();
                let inserted = store.insert_many(records, options).await?;
                Ok(JobResponse::data(rows(inserted)))
            }
            Action::UpdateBulkRecords => {
                let body = writable_body(job, "updateBulkRecords")?;
                let changed = store.update_many(updated(body, stamp), options).await?;
                Ok(JobResponse::data(changed))
            }
            Action::DeleteBulkRecords => {
                if !options.has_filter() && !options.truncate {
                    return Err(JobError::missing("deleteBulkRecords", "where"));
                }
                let removed = store.delete_many(stamp, options).await?;
                Ok(JobResponse::data(removed))
            }
        }
    }

    async fn update_target(
        &self,
        target: RecordTarget,
        body: Record,
        stamp: Option<i64>,
        options: &JobOption,
    ) -> Result<JobResponse, JobError> {
        let outcome = self
            .store
            .update(&target, updated(body, stamp), options)
            .await?
            .ok_or_else(JobError::record_not_found)?;
        Ok(JobResponse {
            previous_data: Some(Value::Object(outcome.previous)),
            ..JobResponse::data(outcome.current)
        })
    }
}

fn rows(rows: Vec<Record>) -> Value {
    Value::Array(rows.into_iter().map(Value::Object).collect())
}

fn required_id(job: &Job, operation: &str) -> Result<nestor_core::RecordId, JobError> {
    job.target_id()
        .cloned()
        .ok_or_else(|| JobError::missing(operation, "id"))
}

fn require_filter(options: &JobOption, operation: &str) -> Result<(), JobError> {
    if options.has_filter() {
        Ok(())
    } else {
        Err(JobError::missing(operation, "where"))
    }
}

/// The job body narrowed to `options.fields`.
fn writable_body(job: &Job, operation: &str) -> Result<Record, JobError> {
    job.body
        .clone()
        .map(|body| restrict(body, &job.options))
        .ok_or_else(|| JobError::missing(operation, "body"))
}

fn restrict(mut body: Record, options: &JobOption) -> Record {
    if let Some(fields) = &options.fields {
        body.retain(|key, _| fields.iter().any(|f| f == key));
    }
    body
}

fn found_or_empty(found: Option<Record>, options: &JobOption) -> Result<JobResponse, JobError> {
    match found {
        Some(record) => Ok(JobResponse::data(record)),
        None if options.allow_empty => Ok(JobResponse::data(Value::Null)),
        None => Err(JobError::record_not_found()),
    }
}

fn created(mut body: Record, stamp: Option<i64>) -> Record {
    if let Some(owner) = stamp {
        body.insert("created_by".into(), owner.into());
        body.insert("updated_by".into(), owner.into());
    }
    body
}

fn updated(mut body: Record, stamp: Option<i64>) -> Record {
    if let Some(owner) = stamp {
        body.insert("updated_by".into(), owner.into());
    }
    body
}
