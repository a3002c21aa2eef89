// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle extension points around every model operation.
//!
//! A job flows `before_* -> native operation -> after_*`. Each stage takes
//! the previous stage's value and returns a new one: `before_*` hands back
//! the job the operation should see (or rejects it), `after_*` hands back
//! the response the caller receives. Returning `Err` short-circuits the
//! pipeline and becomes the job's error response.

use async_trait::async_trait;
use nestor_core::{Action, Job, JobError, JobResponse, Phase, RecordStore};

/// What a hook can see besides the job itself.
#[derive(Clone, Copy)]
pub struct HookContext<'a> {
    pub action: Action,
    /// The store the operation runs against, for lookups such as uniqueness
    /// checks.
    pub store: &'a dyn RecordStore,
}

impl HookContext<'_> {
    pub fn phase(&self) -> Phase {
        self.action.phase()
    }
}

/// Per-entity domain rules. Every method defaults to a pass-through.
#[async_trait]
pub trait ModelHooks: Send + Sync + 'static {
    async fn before_read(&self, _ctx: HookContext<'_>, job: &Job) -> Result<Job, JobError> {
        Ok(job.clone())
    }

    async fn after_read(
        &self,
        _ctx: HookContext<'_>,
        _job: &Job,
        response: JobResponse,
    ) -> Result<JobResponse, JobError> {
        Ok(response)
    }

    async fn before_write(&self, _ctx: HookContext<'_>, job: &Job) -> Result<Job, JobError> {
        Ok(job.clone())
    }

    async fn after_write(
        &self,
        _ctx: HookContext<'_>,
        _job: &Job,
        response: JobResponse,
    ) -> Result<JobResponse, JobError> {
        Ok(response)
    }

    async fn before_delete(&self, _ctx: HookContext<'_>, job: &Job) -> Result<Job, JobError> {
        Ok(job.clone())
    }

    async fn after_delete(
        &self,
        _ctx: HookContext<'_>,
        _job: &Job,
        response: JobResponse,
    ) -> Result<JobResponse, JobError> {
        Ok(response)
    }
}

/// Hooks that change nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl ModelHooks for NoHooks {}

/// Runs the `before_*` hook matching the context's phase.
pub(crate) async fn before(
    hooks: &dyn ModelHooks,
    ctx: HookContext<'_>,
    job: &Job,
) -> Result<Job, JobError> {
    match ctx.phase() {
        Phase::Read => hooks.before_read(ctx, job).await,
        Phase::Write => hooks.before_write(ctx, job).await,
        Phase::Delete => hooks.before_delete(ctx, job).await,
    }
}

/// Runs the `after_*` hook matching the context's phase.
pub(crate) async fn after(
    hooks: &dyn ModelHooks,
    ctx: HookContext<'_>,
    job: &Job,
    response: JobResponse,
) -> Result<JobResponse, JobError> {
    match ctx.phase() {
        Phase::Read => hooks.after_read(ctx, job, response).await,
        Phase::Write => hooks.after_write(ctx, job, response).await,
        Phase::Delete => hooks.after_delete(ctx, job, response).await,
    }
}
